//! Client facade tests: calls, RPC correlation, state subscription, and
//! cookie handling over the mock connector.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{settle, MockConnector};
use hfn::{
    ClientOptions, HfnClient, HfnError, MemoryStorage, MessagePayload,
    Model, Packet, SchemaIndex, Storage, Value,
};
use hfn_schema::SchemaKey;

const CONFIG: &str = r#"[
    "app-1", [], "wss://mock.example.com",
    [[0, "", "",
        [[1, [[1, "count", "i", 0]]]],
        [[1, "counter", [[0, 1, ""]], [[1, 1, "incr"]]]],
        [[1, "history", 1, 1]]
    ]]
]"#;

fn index() -> Arc<SchemaIndex> {
    Arc::new(SchemaIndex::from_json(CONFIG).unwrap())
}

fn count_bytes(n: i64) -> Vec<u8> {
    let index = index();
    let schema = index
        .schema(SchemaKey {
            package_id: 0,
            schema_id: 1,
        })
        .unwrap();
    let mut model = Model::new(schema, index.clone());
    assert!(model.set("count", Value::Int(n)));
    model.encode()
}

fn connect(
    connector: &MockConnector,
    storage: Arc<MemoryStorage>,
) -> HfnClient {
    HfnClient::connect_with(
        connector.clone(),
        CONFIG,
        ClientOptions {
            storage,
            rpc_timeout: Duration::from_secs(60),
        },
    )
    .unwrap()
}

/// Digs the decoded message payloads out of everything written so far.
fn written_messages(attempt: &common::Attempt) -> Vec<(u32, MessagePayload)> {
    attempt
        .written()
        .into_iter()
        .flatten()
        .filter_map(|packet| match packet {
            Packet::Message {
                package_id,
                payload,
                ..
            } => Some((
                package_id,
                MessagePayload::decode(&payload).unwrap(),
            )),
            _ => None,
        })
        .collect()
}

fn message_packet(payload: &MessagePayload) -> Packet {
    Packet::Message {
        id: 0,
        package_id: 0,
        headers: Vec::new(),
        payload: payload.encode(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_client_id_is_generated_once_and_persisted() {
    let storage = Arc::new(MemoryStorage::new());
    let connector = MockConnector::new();
    let _client = connect(&connector, storage.clone());
    settle().await;

    let stored = storage.get("_HFN_app-1_CID");
    let attempt = connector.attempt(0);
    assert_eq!(Some(attempt.params.client_id.clone()), stored);

    // A second client with the same storage reuses the id.
    let connector2 = MockConnector::new();
    let _client2 = connect(&connector2, storage.clone());
    settle().await;
    assert_eq!(
        connector2.attempt(0).params.client_id,
        attempt.params.client_id
    );
}

#[tokio::test(start_paused = true)]
async fn test_ready_resolves_after_open() {
    let connector = MockConnector::new();
    let client = connect(&connector, Arc::new(MemoryStorage::new()));
    settle().await;
    assert!(!client.is_ready());

    connector.attempt(0).open(25, 20);
    settle().await;
    assert!(client.is_ready());
    client.ready().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_hfn_encodes_payload_against_its_schema() {
    let connector = MockConnector::new();
    let client = connect(&connector, Arc::new(MemoryStorage::new()));
    settle().await;
    let attempt = connector.attempt(0);
    attempt.open(25, 20);
    settle().await;

    let obj = Value::Map(vec![("count".into(), Value::Int(5))]);
    client.hfn("counter.incr", Some(&obj)).await.unwrap();
    settle().await;

    let messages = written_messages(&attempt);
    assert_eq!(messages.len(), 1);
    let (package_id, payload) = &messages[0];
    assert_eq!(*package_id, 0);
    match payload {
        MessagePayload::CallFunction {
            module_id,
            function_id,
            cookies,
            payload,
        } => {
            assert_eq!(*module_id, 1);
            assert_eq!(*function_id, 1);
            assert!(cookies.is_none());

            let idx = index();
            let schema = idx
                .schema(SchemaKey {
                    package_id: 0,
                    schema_id: 1,
                })
                .unwrap();
            let mut model = Model::new(schema, idx.clone());
            model.decode(payload.as_ref().unwrap()).unwrap();
            assert_eq!(model.to_object(), obj);
        }
        other => panic!("expected call-function, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_unknown_names_fail_synchronously() {
    let connector = MockConnector::new();
    let client = connect(&connector, Arc::new(MemoryStorage::new()));
    settle().await;
    connector.attempt(0).open(25, 20);
    settle().await;

    let result = client.hfn("nope", None).await;
    assert!(matches!(result, Err(HfnError::HfnNotFound(_))));

    let result = client.rpc("nope", None).await;
    assert!(matches!(result, Err(HfnError::RpcNotFound(_))));

    assert!(matches!(
        client.model("nope"),
        Err(HfnError::ModelNotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_rpc_resolves_with_the_matching_ack_id() {
    let connector = MockConnector::new();
    let client =
        Arc::new(connect(&connector, Arc::new(MemoryStorage::new())));
    settle().await;
    let attempt = connector.attempt(0);
    attempt.open(25, 20);
    settle().await;

    // Two concurrent calls to the same RPC.
    let first = tokio::spawn({
        let client = client.clone();
        async move { client.rpc("history", None).await }
    });
    let second = tokio::spawn({
        let client = client.clone();
        async move { client.rpc("history", None).await }
    });
    settle().await;

    let requests: Vec<(u32, u32)> = written_messages(&attempt)
        .into_iter()
        .filter_map(|(_, payload)| match payload {
            MessagePayload::RpcRequest { rpc_id, ack_id, .. } => {
                Some((rpc_id, ack_id))
            }
            _ => None,
        })
        .collect();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].0, 1);
    assert_ne!(requests[0].1, requests[1].1, "ack ids must be distinct");

    // Answer the second call first; only it resolves.
    attempt.packets(vec![message_packet(&MessagePayload::RpcResponse {
        rpc_id: 1,
        ack_id: requests[1].1,
        payload: Some(count_bytes(42)),
    })]);
    settle().await;

    assert!(!first.is_finished());
    let response = second.await.unwrap().unwrap();
    assert_eq!(
        response.to_object(),
        Value::Map(vec![("count".into(), Value::Int(42))])
    );

    attempt.packets(vec![message_packet(&MessagePayload::RpcResponse {
        rpc_id: 1,
        ack_id: requests[0].1,
        payload: Some(count_bytes(7)),
    })]);
    settle().await;
    let response = first.await.unwrap().unwrap();
    assert_eq!(
        response.to_object(),
        Value::Map(vec![("count".into(), Value::Int(7))])
    );
}

#[tokio::test(start_paused = true)]
async fn test_rpc_times_out_and_drops_the_late_response() {
    let connector = MockConnector::new();
    let client =
        Arc::new(connect(&connector, Arc::new(MemoryStorage::new())));
    settle().await;
    let attempt = connector.attempt(0);
    attempt.open(25, 20);
    settle().await;

    let call = tokio::spawn({
        let client = client.clone();
        async move {
            client
                .rpc_with_timeout("history", None, Duration::from_secs(1))
                .await
        }
    });
    settle().await;

    let requests = written_messages(&attempt);
    let ack_id = match &requests[0].1 {
        MessagePayload::RpcRequest { ack_id, .. } => *ack_id,
        other => panic!("expected rpc request, got {other:?}"),
    };

    tokio::time::advance(Duration::from_millis(1100)).await;
    settle().await;
    let result = call.await.unwrap();
    assert!(matches!(result, Err(HfnError::RpcTimeout(_))));

    // The late response is silently dropped.
    attempt.packets(vec![message_packet(&MessagePayload::RpcResponse {
        rpc_id: 1,
        ack_id,
        payload: Some(count_bytes(42)),
    })]);
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn test_state_updates_reach_subscribers() {
    let connector = MockConnector::new();
    let client = connect(&connector, Arc::new(MemoryStorage::new()));
    let mut updates = client.subscribe();
    settle().await;
    let attempt = connector.attempt(0);
    attempt.open(25, 20);
    settle().await;

    attempt.packets(vec![message_packet(&MessagePayload::SetState {
        package_id: 0,
        module_id: 1,
        payload: count_bytes(42),
    })]);
    settle().await;

    let change = updates.try_recv().unwrap();
    assert_eq!(change.package_id, 0);
    assert_eq!(change.module_id, 1);
    assert_eq!(change.module, "counter");
    assert_eq!(
        change.state.to_object(),
        Value::Map(vec![("count".into(), Value::Int(42))])
    );
}

#[tokio::test(start_paused = true)]
async fn test_pushed_cookies_persist_and_ride_outbound_calls() {
    let storage = Arc::new(MemoryStorage::new());
    let connector = MockConnector::new();
    let client = connect(&connector, storage.clone());
    settle().await;
    let attempt = connector.attempt(0);
    attempt.open(25, 20);
    settle().await;

    attempt.packets(vec![message_packet(&MessagePayload::SetCookie {
        name: "sess".into(),
        value: "abc".into(),
        max_age: 0,
        is_private: false,
    })]);
    settle().await;

    let persisted = storage.get("_HFN_app-1_COOKIES").unwrap();
    assert!(persisted.contains("sess"));

    client.hfn("counter.incr", None).await.unwrap();
    settle().await;

    let messages = written_messages(&attempt);
    let cookies = match &messages[0].1 {
        MessagePayload::CallFunction { cookies, .. } => {
            cookies.clone().unwrap()
        }
        other => panic!("expected call-function, got {other:?}"),
    };
    let pairs = hfn_wire::decode(&cookies).unwrap();
    assert_eq!(
        pairs,
        Value::List(vec![Value::List(vec![
            Value::Str("sess".into()),
            Value::Str("abc".into()),
        ])])
    );
}

#[tokio::test(start_paused = true)]
async fn test_model_round_trips_through_the_facade() {
    let connector = MockConnector::new();
    let client = connect(&connector, Arc::new(MemoryStorage::new()));
    settle().await;

    let mut model = client.model("counter.State").unwrap();
    let obj = Value::Map(vec![("count".into(), Value::Int(42))]);
    model.from_object(&obj).unwrap();
    let bytes = model.encode();

    let mut fresh = client.model("counter.State").unwrap();
    fresh.decode(&bytes).unwrap();
    assert_eq!(fresh.to_object(), obj);
}
