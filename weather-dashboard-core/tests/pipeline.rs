//! Stage and end-to-end tests against a wiremock provider and an in-memory store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Value, json};
use weather_dashboard_core::{
    BucketStatus, CaptureTimestamp, ObjectStore, OpenWeatherProvider, Pipeline, PipelineError,
    PipelineSettings, ScheduleConfig, Scheduler, StepPolicy, StorageError, StorageInitializer,
    WeatherBatch, WeatherFetcher, WeatherObservation, WeatherPersister,
};
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BUCKET: &str = "weather-bucket";

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Head(String),
    Create(String),
    Put { key: String, content_type: String },
}

#[derive(Debug, Default)]
struct StoreState {
    calls: Vec<Call>,
    objects: HashMap<String, Vec<u8>>,
}

/// In-memory store that records every call and can be told to fail.
#[derive(Debug, Default)]
struct RecordingStore {
    head_fails: bool,
    create_fails: bool,
    fail_put_key: Option<String>,
    state: Mutex<StoreState>,
}

impl RecordingStore {
    fn existing() -> Self {
        Self::default()
    }

    fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    fn puts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Put { key, .. } => Some(key),
                _ => None,
            })
            .collect()
    }

    fn object(&self, key: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .get(key)
            .map(|body| serde_json::from_slice(body).unwrap())
    }

    fn object_count(&self) -> usize {
        self.state.lock().unwrap().objects.len()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<(), StorageError> {
        self.state.lock().unwrap().calls.push(Call::Head(bucket.to_string()));
        if self.head_fails {
            Err(StorageError::new("head_bucket", "403 Forbidden"))
        } else {
            Ok(())
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<(), StorageError> {
        self.state.lock().unwrap().calls.push(Call::Create(bucket.to_string()));
        if self.create_fails {
            Err(StorageError::new("create_bucket", "BucketAlreadyOwnedByYou"))
        } else {
            Ok(())
        }
    }

    async fn put_object(
        &self,
        _bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Put {
            key: key.to_string(),
            content_type: content_type.to_string(),
        });
        if self.fail_put_key.as_deref() == Some(key) {
            return Err(StorageError::new("put_object", "SlowDown"));
        }
        state.objects.insert(key.to_string(), body);
        Ok(())
    }
}

fn payload(city: &str, temp: f64) -> Value {
    json!({
        "name": city,
        "main": { "temp": temp, "feels_like": temp - 3.0, "humidity": 70 },
        "weather": [{ "id": 803, "description": "broken clouds" }],
        "wind": { "speed": 6.9 },
        "cod": 200
    })
}

fn ok_json(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

async fn mount_city(server: &MockServer, city: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(query_param("q", city))
        .and(query_param("units", "imperial"))
        .respond_with(response)
        .mount(server)
        .await;
}

fn settings(server: &MockServer, cities: &[&str]) -> PipelineSettings {
    PipelineSettings {
        api_key: "TEST_KEY".to_string(),
        bucket_name: BUCKET.to_string(),
        namespace: "weather-data".to_string(),
        base_url: format!("{}/data/2.5/weather", server.uri()),
        http_timeout: Duration::from_secs(5),
        cities: cities.iter().map(|c| c.to_string()).collect(),
        schedule: ScheduleConfig {
            interval_minutes: 60,
            retries: 1,
            retry_delay_secs: 0,
        },
    }
}

fn fetcher(server: &MockServer, cities: &[&str]) -> WeatherFetcher {
    let s = settings(server, cities);
    let provider = OpenWeatherProvider::new(s.api_key, s.base_url, s.http_timeout).unwrap();
    WeatherFetcher::new(Arc::new(provider), s.cities)
}

fn pipeline(server: &MockServer, cities: &[&str], store: Arc<RecordingStore>) -> Pipeline {
    Pipeline::with_store(&settings(server, cities), store).unwrap()
}

// ---- fetch ----

#[tokio::test]
async fn fetch_returns_one_entry_per_city_with_original_payload() {
    let server = MockServer::start().await;
    let cities = ["Philadelphia", "Seattle", "New York"];
    for (i, city) in cities.iter().enumerate() {
        mount_city(&server, city, ok_json(payload(city, 50.0 + i as f64))).await;
    }

    let batch = fetcher(&server, &cities).fetch().await.unwrap();

    assert_eq!(batch.len(), 3);
    assert_eq!(batch.cities().collect::<Vec<_>>(), cities);
    for (i, city) in cities.iter().enumerate() {
        let expected = payload(city, 50.0 + i as f64);
        assert_eq!(batch.get(city).unwrap().clone().into_value(), expected);
    }
}

#[tokio::test]
async fn fetch_omits_failing_city_and_keeps_the_rest() {
    let server = MockServer::start().await;
    let not_found = json!({"cod": "404", "message": "city not found"});
    mount_city(&server, "Philadelphia", ok_json(payload("Philadelphia", 41.0))).await;
    mount_city(&server, "Seattle", ResponseTemplate::new(404).set_body_json(not_found)).await;
    mount_city(&server, "New York", ok_json(payload("New York", 47.0))).await;

    let batch = fetcher(&server, &["Philadelphia", "Seattle", "New York"])
        .fetch()
        .await
        .unwrap();

    assert_eq!(batch.len(), 2);
    assert!(!batch.contains("Seattle"));
    assert_eq!(
        batch.get("New York").unwrap().clone().into_value(),
        payload("New York", 47.0)
    );
}

#[tokio::test]
async fn fetch_fails_on_success_response_missing_summary_fields() {
    let server = MockServer::start().await;
    mount_city(&server, "Philadelphia", ok_json(payload("Philadelphia", 41.0))).await;
    mount_city(&server, "Seattle", ok_json(json!({"name": "Seattle", "cod": 200}))).await;

    let err = fetcher(&server, &["Philadelphia", "Seattle"])
        .fetch()
        .await
        .unwrap_err();

    match &err {
        PipelineError::MalformedResponse { city, .. } => assert_eq!(city, "Seattle"),
        other => panic!("expected malformed response, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_fails_on_success_response_that_is_not_an_object() {
    let server = MockServer::start().await;
    mount_city(&server, "Seattle", ok_json(json!([1, 2, 3]))).await;

    let err = fetcher(&server, &["Seattle"]).fetch().await.unwrap_err();

    assert!(matches!(err, PipelineError::MalformedResponse { .. }));
}

#[tokio::test]
async fn fetch_with_every_city_failing_is_empty_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let batch = fetcher(&server, &["Philadelphia", "Seattle"])
        .fetch()
        .await
        .unwrap();
    assert!(batch.is_empty());
}

// ---- initialize ----

#[tokio::test]
async fn existing_bucket_is_not_created() {
    let store = Arc::new(RecordingStore::existing());
    let init = StorageInitializer::new(store.clone(), BUCKET);

    let status = init.ensure_bucket().await.unwrap();

    assert_eq!(status, BucketStatus::Existing);
    assert_eq!(store.calls(), vec![Call::Head(BUCKET.to_string())]);
}

#[tokio::test]
async fn any_head_error_triggers_exactly_one_create() {
    let store = Arc::new(RecordingStore {
        head_fails: true,
        ..Default::default()
    });
    let init = StorageInitializer::new(store.clone(), BUCKET);

    let status = init.ensure_bucket().await.unwrap();

    assert_eq!(status, BucketStatus::Created);
    assert_eq!(
        store.calls(),
        vec![Call::Head(BUCKET.to_string()), Call::Create(BUCKET.to_string())]
    );
}

#[tokio::test]
async fn failed_create_is_fatal() {
    let store = Arc::new(RecordingStore {
        head_fails: true,
        create_fails: true,
        ..Default::default()
    });
    let init = StorageInitializer::new(store.clone(), BUCKET);

    let err = init.ensure_bucket().await.unwrap_err();

    assert!(matches!(err, PipelineError::BucketCreate { .. }));
    assert!(err.to_string().contains(BUCKET));
}

// ---- persist ----

fn batch_of(cities: &[&str]) -> WeatherBatch {
    let mut batch = WeatherBatch::new();
    for city in cities {
        batch.insert(*city, WeatherObservation::from_value(payload(city, 55.0)).unwrap());
    }
    batch
}

#[tokio::test]
async fn empty_batch_fails_before_any_write() {
    let store = Arc::new(RecordingStore::existing());
    let persister = WeatherPersister::new(store.clone(), BUCKET, "weather-data");

    let err = persister.persist(&WeatherBatch::new()).await.unwrap_err();

    assert!(matches!(err, PipelineError::NoWeatherData));
    assert_eq!(err.to_string(), "no weather data available");
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn persist_writes_stamped_json_under_shared_timestamp() {
    let store = Arc::new(RecordingStore::existing());
    let persister = WeatherPersister::new(store.clone(), BUCKET, "weather-data");
    let ts = CaptureTimestamp::parse("20250101-120000").unwrap();

    let keys = persister
        .persist_at(&batch_of(&["Philadelphia", "Seattle"]), ts)
        .await
        .unwrap();

    let keys: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
    assert_eq!(
        keys,
        vec![
            "weather-data/Philadelphia-20250101-120000.json",
            "weather-data/Seattle-20250101-120000.json",
        ]
    );

    let seattle = store.object("weather-data/Seattle-20250101-120000.json").unwrap();
    assert_eq!(seattle["timestamp"], "20250101-120000");
    assert_eq!(seattle["main"]["temp"], 55.0);
    assert_eq!(seattle["wind"]["speed"], 6.9);

    for call in store.calls() {
        if let Call::Put { content_type, .. } = call {
            assert_eq!(content_type, "application/json");
        }
    }
}

#[tokio::test]
async fn same_city_and_timestamp_overwrites_the_same_key() {
    let store = Arc::new(RecordingStore::existing());
    let persister = WeatherPersister::new(store.clone(), BUCKET, "weather-data");
    let ts = CaptureTimestamp::parse("20250101-120000").unwrap();
    let batch = batch_of(&["Seattle"]);

    persister.persist_at(&batch, ts).await.unwrap();
    persister.persist_at(&batch, ts).await.unwrap();

    let puts = store.puts();
    assert_eq!(puts.len(), 2);
    assert_eq!(puts[0], puts[1]);
    assert_eq!(store.object_count(), 1);
}

#[tokio::test]
async fn first_failed_write_stops_remaining_cities() {
    let store = Arc::new(RecordingStore {
        fail_put_key: Some("weather-data/Seattle-20250101-120000.json".to_string()),
        ..Default::default()
    });
    let persister = WeatherPersister::new(store.clone(), BUCKET, "weather-data");
    let ts = CaptureTimestamp::parse("20250101-120000").unwrap();

    let err = persister
        .persist_at(&batch_of(&["Philadelphia", "Seattle", "New York"]), ts)
        .await
        .unwrap_err();

    match &err {
        PipelineError::PersistWrite { city, .. } => assert_eq!(city, "Seattle"),
        other => panic!("expected write failure, got {other:?}"),
    }
    assert_eq!(
        store.puts(),
        vec![
            "weather-data/Philadelphia-20250101-120000.json",
            "weather-data/Seattle-20250101-120000.json",
        ]
    );
}

// ---- end to end ----

#[tokio::test]
async fn run_writes_one_object_per_city_sharing_a_timestamp() {
    let server = MockServer::start().await;
    for city in ["Philadelphia", "Seattle"] {
        mount_city(&server, city, ok_json(payload(city, 55.0))).await;
    }
    let store = Arc::new(RecordingStore::existing());

    let report = pipeline(&server, &["Philadelphia", "Seattle"], store.clone())
        .run_once()
        .await
        .unwrap();

    assert_eq!(report.bucket, BucketStatus::Existing);
    assert_eq!(report.fetched, 2);
    assert_eq!(report.written.len(), 2);

    let philly = report.written[0].as_str();
    let seattle = report.written[1].as_str();
    let philly_ts = philly
        .strip_prefix("weather-data/Philadelphia-")
        .and_then(|s| s.strip_suffix(".json"))
        .unwrap();
    let seattle_ts = seattle
        .strip_prefix("weather-data/Seattle-")
        .and_then(|s| s.strip_suffix(".json"))
        .unwrap();
    assert_eq!(philly_ts, seattle_ts);
    assert!(CaptureTimestamp::parse(philly_ts).is_ok());

    for (key, city) in [(philly, "Philadelphia"), (seattle, "Seattle")] {
        let mut stored = store.object(key).unwrap();
        assert_eq!(stored["timestamp"], philly_ts);
        stored.as_object_mut().unwrap().remove("timestamp");
        assert_eq!(stored, payload(city, 55.0));
    }
}

#[tokio::test]
async fn run_fails_with_no_data_when_provider_errors_for_all_cities() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let store = Arc::new(RecordingStore::existing());

    let err = pipeline(&server, &["Philadelphia", "Seattle"], store.clone())
        .run_once()
        .await
        .unwrap_err();

    assert!(err.to_string().contains("no weather data available"));
    assert_eq!(store.object_count(), 0);
    assert!(store.puts().is_empty());
}

#[tokio::test]
async fn run_with_malformed_success_response_fails_without_writing() {
    let server = MockServer::start().await;
    mount_city(&server, "Philadelphia", ok_json(payload("Philadelphia", 41.0))).await;
    Mock::given(method("GET"))
        .and(query_param("q", "Seattle"))
        .respond_with(ok_json(json!({"name": "Seattle", "cod": 200})))
        .expect(2)
        .mount(&server)
        .await;
    let store = Arc::new(RecordingStore::existing());

    // settings() uses one retry, so the fetch step runs twice
    let err = pipeline(&server, &["Philadelphia", "Seattle"], store.clone())
        .run_once()
        .await
        .unwrap_err();

    match &err {
        PipelineError::MalformedResponse { city, .. } => assert_eq!(city, "Seattle"),
        other => panic!("expected malformed response, got {other:?}"),
    }
    assert!(store.puts().is_empty());
    assert_eq!(store.object_count(), 0);
}

#[tokio::test]
async fn run_stops_before_fetch_when_bucket_cannot_be_created() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(payload("Seattle", 55.0)))
        .expect(0)
        .mount(&server)
        .await;
    let store = Arc::new(RecordingStore {
        head_fails: true,
        create_fails: true,
        ..Default::default()
    });

    let settings = settings(&server, &["Seattle"]);
    let provider = OpenWeatherProvider::new(
        settings.api_key.clone(),
        settings.base_url.clone(),
        settings.http_timeout,
    )
    .unwrap();
    let pipeline = Pipeline::new(
        StorageInitializer::new(store.clone(), BUCKET),
        WeatherFetcher::new(Arc::new(provider), settings.cities.clone()),
        WeatherPersister::new(store.clone(), BUCKET, "weather-data"),
        StepPolicy::no_retry(),
    );

    let err = pipeline.run_once().await.unwrap_err();

    assert!(matches!(err, PipelineError::BucketCreate { .. }));
    assert_eq!(
        store.calls(),
        vec![Call::Head(BUCKET.to_string()), Call::Create(BUCKET.to_string())]
    );
}

#[tokio::test]
async fn bucket_step_is_retried_once_before_the_run_fails() {
    let server = MockServer::start().await;
    let store = Arc::new(RecordingStore {
        head_fails: true,
        create_fails: true,
        ..Default::default()
    });

    // settings() uses one retry with no delay
    let err = pipeline(&server, &["Seattle"], store.clone())
        .run_once()
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::BucketCreate { .. }));
    let creates = store
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Create(_)))
        .count();
    assert_eq!(creates, 2);
}

#[tokio::test]
async fn scheduler_runs_immediately_and_stops_on_shutdown() {
    let server = MockServer::start().await;
    mount_city(&server, "Seattle", ok_json(payload("Seattle", 55.0))).await;
    let store = Arc::new(RecordingStore::existing());

    let scheduler = Scheduler::new(
        pipeline(&server, &["Seattle"], store.clone()),
        Duration::from_secs(3600),
    );

    let runs = scheduler
        .run_until(tokio::time::sleep(Duration::from_millis(500)))
        .await;

    assert_eq!(runs, 1);
    assert_eq!(store.object_count(), 1);
}

#[tokio::test]
async fn shutdown_abandons_a_slow_in_flight_run() {
    let server = MockServer::start().await;
    let slow = ok_json(payload("Seattle", 55.0)).set_delay(Duration::from_secs(3));
    mount_city(&server, "Seattle", slow).await;
    let store = Arc::new(RecordingStore::existing());

    let scheduler = Scheduler::new(
        pipeline(&server, &["Seattle"], store.clone()),
        Duration::from_secs(3600),
    );

    let started = Instant::now();
    let runs = scheduler
        .run_until(tokio::time::sleep(Duration::from_millis(200)))
        .await;
    let elapsed = started.elapsed();

    assert_eq!(runs, 1);
    assert!(elapsed < Duration::from_secs(2), "took {elapsed:?}");
    assert_eq!(store.object_count(), 0);
}
