//! End-to-end: a client speaking the framed protocol against a running
//! server.

use std::sync::Arc;

use bytes::BytesMut;
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Semaphore};
use vonnegut::cluster::ClusterManager;
use vonnegut::message::MemoryRecords;
use vonnegut::protocol::{
    ApiKey, ApiResponse, CorrelationIdGenerator, ErrorCode, FetchRequest, MetadataRequest,
    PartitionFetchData, PartitionProduceData, ProduceRequest, ResponseDecoder, TopicFetchData,
    TopicProduceData, TopicsRequest,
};
use vonnegut::service::Server;
use vonnegut::{LogConfig, LogManager, Node};

const MAX_FRAME: usize = 4 * 1024 * 1024;

struct TestClient {
    stream: TcpStream,
    buffer: BytesMut,
    decoder: ResponseDecoder,
    correlation_ids: CorrelationIdGenerator,
}

impl TestClient {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.unwrap(),
            buffer: BytesMut::new(),
            decoder: ResponseDecoder::new(),
            correlation_ids: CorrelationIdGenerator::new(),
        }
    }

    async fn send(&mut self, api_key: ApiKey, frame: BytesMut, correlation_id: i32) {
        self.decoder.register(correlation_id, api_key);
        self.stream.write_all(&frame).await.unwrap();
    }

    async fn next_response(&mut self) -> (i32, ApiResponse) {
        loop {
            if let Some(response) = self.decoder.decode(&mut self.buffer).unwrap() {
                return response;
            }
            let n = self.stream.read_buf(&mut self.buffer).await.unwrap();
            assert!(n > 0, "server closed the connection unexpectedly");
        }
    }
}

async fn start_server(log_dir: &std::path::Path) -> (std::net::SocketAddr, Arc<LogManager>) {
    let config = LogConfig {
        log_dirs: vec![log_dir.to_string_lossy().to_string()],
        ..Default::default()
    };
    let log_manager = Arc::new(LogManager::startup(config).unwrap());
    let cluster = Arc::new(ClusterManager::new_local(
        Node {
            node_id: 0,
            host: "127.0.0.1".into(),
            port: 0,
        },
        1,
    ));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (notify_shutdown, _) = broadcast::channel(1);
    let (shutdown_complete_tx, _shutdown_complete_rx) = mpsc::channel(1);

    let server = Server::new(
        listener,
        Arc::new(Semaphore::new(16)),
        notify_shutdown,
        shutdown_complete_tx,
        log_manager.clone(),
        cluster,
        MAX_FRAME,
    );
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    (addr, log_manager)
}

#[tokio::test]
async fn metadata_produce_fetch_round_trip() {
    let dir = tempdir().unwrap();
    let (addr, _log_manager) = start_server(dir.path()).await;
    let mut client = TestClient::connect(addr).await;

    // metadata for an unknown topic creates it
    let id = client.correlation_ids.next();
    let frame = MetadataRequest {
        topics: vec!["events".into()],
    }
    .encode(id, Some("it-client"));
    client.send(ApiKey::Metadata, frame, id).await;
    let (_, response) = client.next_response().await;
    let ApiResponse::Metadata(metadata) = response else {
        panic!("wrong api");
    };
    assert_eq!(metadata.topics.len(), 1);
    assert_eq!(metadata.topics[0].error_code, ErrorCode::None);
    assert_eq!(metadata.topics[0].partitions.len(), 1);
    assert_eq!(metadata.brokers[0].host, "127.0.0.1");

    // produce two records
    let id = client.correlation_ids.next();
    let frame = ProduceRequest {
        acks: 1,
        timeout_ms: 1000,
        topic_data: vec![TopicProduceData {
            topic: "events".into(),
            partition_data: vec![PartitionProduceData {
                partition: 0,
                records: MemoryRecords::from_payloads(["first", "second"]),
            }],
        }],
    }
    .encode(id, Some("it-client"));
    client.send(ApiKey::Produce, frame, id).await;
    let (_, response) = client.next_response().await;
    let ApiResponse::Produce(produce) = response else {
        panic!("wrong api");
    };
    let slot = &produce.topic_data[0].partition_data[0];
    assert_eq!(slot.error_code, ErrorCode::None);
    assert_eq!(slot.offset, 0);

    // fetch them back from the assigned offset
    let id = client.correlation_ids.next();
    let frame = FetchRequest {
        replica_id: -1,
        max_wait_ms: 0,
        min_bytes: 1,
        topic_data: vec![TopicFetchData {
            topic: "events".into(),
            partition_data: vec![PartitionFetchData {
                partition: 0,
                fetch_offset: 0,
                max_bytes: 0,
            }],
        }],
    }
    .encode(id, Some("it-client"));
    client.send(ApiKey::Fetch, frame, id).await;
    let (_, response) = client.next_response().await;
    let ApiResponse::Fetch(fetch) = response else {
        panic!("wrong api");
    };
    let slot = &fetch.topic_data[0].partition_data[0];
    assert_eq!(slot.error_code, ErrorCode::None);
    assert_eq!(slot.high_water_mark, 2);
    let payloads: Vec<_> = slot.records.records().map(|r| r.payload.to_vec()).collect();
    assert_eq!(payloads, vec![b"first".to_vec(), b"second".to_vec()]);

    // topics api reports the replica chain
    let id = client.correlation_ids.next();
    let frame = TopicsRequest { topics: vec![] }.encode(id, None);
    client.send(ApiKey::Topics, frame, id).await;
    let (_, response) = client.next_response().await;
    let ApiResponse::Topics(topics) = response else {
        panic!("wrong api");
    };
    assert_eq!(topics.topics[0].topic, "events");
    assert_eq!(topics.topics[0].chain.len(), 1);
}

#[tokio::test]
async fn produce_to_unknown_partition_reports_error_slot() {
    let dir = tempdir().unwrap();
    let (addr, log_manager) = start_server(dir.path()).await;
    let mut client = TestClient::connect(addr).await;

    let id = client.correlation_ids.next();
    let frame = ProduceRequest {
        acks: 1,
        timeout_ms: 1000,
        topic_data: vec![TopicProduceData {
            topic: "nobody-made-this".into(),
            partition_data: vec![PartitionProduceData {
                partition: 0,
                records: MemoryRecords::from_payloads(["x"]),
            }],
        }],
    }
    .encode(id, None);
    client.send(ApiKey::Produce, frame, id).await;
    let (_, response) = client.next_response().await;
    let ApiResponse::Produce(produce) = response else {
        panic!("wrong api");
    };
    let slot = &produce.topic_data[0].partition_data[0];
    assert_eq!(slot.error_code, ErrorCode::UnknownTopicOrPartition);
    assert_eq!(slot.offset, -1);

    // produce must not auto-create
    assert!(log_manager.topics().is_empty());
}

#[tokio::test]
async fn abandoned_oversize_frame_leaves_state_untouched() {
    let dir = tempdir().unwrap();
    let (addr, log_manager) = start_server(dir.path()).await;

    // claim a 1 MiB frame, send 100 bytes, vanish
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(&(1024 * 1024i32).to_be_bytes())
        .await
        .unwrap();
    stream.write_all(&[0u8; 100]).await.unwrap();
    drop(stream);

    // the server drops the half-frame; a fresh connection still works
    let mut client = TestClient::connect(addr).await;
    let id = client.correlation_ids.next();
    let frame = MetadataRequest { topics: vec![] }.encode(id, None);
    client.send(ApiKey::Metadata, frame, id).await;
    let (_, response) = client.next_response().await;
    assert!(matches!(response, ApiResponse::Metadata(_)));
    assert!(log_manager.topics().is_empty());
}
