use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use garmin_connect_client::endpoints::Endpoints;
use garmin_connect_client::http_client::ReqwestGarminClient;
use garmin_connect_client::{FileType, GarminConnectClient};
use secrecy::SecretString;
use tokio::runtime::Builder;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACTIVITIES: u64 = 50;

async fn account_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sso/login"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sso/login"))
        .respond_with(ResponseTemplate::new(200).insert_header("set-cookie", "CASTGC=TGT-1-bench; Path=/"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/post-auth/login"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let activities: Vec<serde_json::Value> = (1..=ACTIVITIES)
        .map(|id| serde_json::json!({"activity": {"activityId": id, "activityName": {"value": "Run"}}}))
        .collect();
    Mock::given(method("GET"))
        .and(path("/proxy/activity-search-service-1.0/json/activities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": {"search": {"totalFound": ACTIVITIES}, "activities": activities}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/proxy/download-service/files/activity/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 16 * 1024]))
        .mount(&server)
        .await;
    server
}

fn bench_bulk_download(c: &mut Criterion) {
    let rt = Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("tokio runtime");

    let (server, client) = rt.block_on(async {
        let server = account_server().await;
        let mut client = ReqwestGarminClient::new(Endpoints::new(&server.uri(), &server.uri()))
            .expect("client");
        client
            .login("bench", &SecretString::new("bench".into()))
            .await
            .expect("login");
        (server, client)
    });

    let mut group = c.benchmark_group("download_all");

    // Every activity is fetched, written to a .part file and renamed into place.
    group.bench_function("fresh_directory", |b| {
        b.to_async(&rt).iter_batched(
            || tempfile::tempdir().expect("tempdir"),
            |dir| {
                let client = client.clone();
                async move {
                    let summary = client
                        .download_all(dir.path(), FileType::Fit, false)
                        .await
                        .expect("bulk");
                    assert_eq!(summary.downloaded as u64, ACTIVITIES);
                }
            },
            BatchSize::PerIteration,
        )
    });

    // Re-run over a complete directory: only search and existence checks.
    let synced = tempfile::tempdir().expect("tempdir");
    rt.block_on(client.download_all(synced.path(), FileType::Fit, false))
        .expect("initial sync");
    let (client_ref, synced_dir) = (&client, synced.path());
    group.bench_function("already_synced", |b| {
        b.to_async(&rt).iter(|| async move {
            let summary = client_ref
                .download_all(synced_dir, FileType::Fit, false)
                .await
                .expect("bulk");
            assert_eq!(summary.skipped as u64, ACTIVITIES);
        })
    });

    group.finish();
    drop(server);
}

criterion_group!(benches, bench_bulk_download);
criterion_main!(benches);
