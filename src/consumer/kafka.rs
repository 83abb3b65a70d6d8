//! Redpanda/Kafka transport

use crate::aggregation::StatisticsSnapshot;
use crate::consumer::config::ConsumerConfig;
use crate::consumer::error::{ConsumerError, ConsumerResult};
use crate::consumer::transport::{EventSource, StatsSink, Transport};
use async_trait::async_trait;
use rdkafka::{
    consumer::{Consumer, StreamConsumer},
    producer::{FutureProducer, FutureRecord, Producer},
    util::Timeout,
    ClientConfig, Message,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Opens a consumer on the login topic and a producer for the statistics topic
#[derive(Debug, Clone)]
pub struct KafkaTransport {
    config: ConsumerConfig,
}

impl KafkaTransport {
    /// Create a transport. Fails on an invalid configuration.
    pub fn new(config: ConsumerConfig) -> ConsumerResult<Self> {
        config.validate().map_err(ConsumerError::ConfigError)?;
        Ok(Self { config })
    }

    fn consumer_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.config.brokers)
            .set("group.id", &self.config.group_id)
            .set("enable.auto.commit", "true")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", self.config.session_timeout_ms.to_string())
            .set("auto.offset.reset", &self.config.auto_offset_reset);
        for (key, value) in &self.config.kafka_properties {
            client_config.set(key, value);
        }
        client_config
    }

    fn producer_config(&self) -> ClientConfig {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &self.config.brokers)
            .set(
                "message.timeout.ms",
                self.config.message_timeout.as_millis().to_string(),
            );
        for (key, value) in &self.config.kafka_properties {
            client_config.set(key, value);
        }
        client_config
    }
}

#[async_trait]
impl Transport for KafkaTransport {
    type Source = KafkaSource;
    type Sink = KafkaSink;

    async fn connect(&self) -> ConsumerResult<(KafkaSource, KafkaSink)> {
        let consumer: StreamConsumer = self
            .consumer_config()
            .create()
            .map_err(|e| ConsumerError::ConnectionError(format!("Failed to create consumer: {}", e)))?;

        consumer
            .subscribe(&[self.config.input_topic.as_str()])
            .map_err(|e| ConsumerError::ConnectionError(format!("Failed to subscribe: {}", e)))?;
        info!("Subscribed to topic: {}", self.config.input_topic);

        let producer: FutureProducer = self
            .producer_config()
            .create()
            .map_err(|e| ConsumerError::ConnectionError(format!("Failed to create producer: {}", e)))?;
        info!("Created producer for topic: {}", self.config.stats_topic);

        Ok((
            KafkaSource { consumer },
            KafkaSink {
                producer,
                topic: self.config.stats_topic.clone(),
                timeout: self.config.message_timeout,
            },
        ))
    }

    fn name(&self) -> &str {
        "kafka"
    }
}

/// Login events consumed from Kafka
pub struct KafkaSource {
    consumer: StreamConsumer,
}

#[async_trait]
impl EventSource for KafkaSource {
    async fn next_payload(&mut self) -> Option<ConsumerResult<Vec<u8>>> {
        match self.consumer.recv().await {
            Ok(message) => {
                debug!(
                    topic = message.topic(),
                    partition = message.partition(),
                    offset = message.offset(),
                    "Received message"
                );
                match message.payload() {
                    Some(payload) => Some(Ok(payload.to_vec())),
                    None => {
                        warn!(offset = message.offset(), "Empty message payload");
                        Some(Ok(Vec::new()))
                    }
                }
            }
            Err(e) => Some(Err(ConsumerError::KafkaError(e))),
        }
    }
}

impl Drop for KafkaSource {
    fn drop(&mut self) {
        self.consumer.unsubscribe();
    }
}

/// Statistics records produced to Kafka, one acknowledged send per record
pub struct KafkaSink {
    producer: FutureProducer,
    topic: String,
    timeout: Duration,
}

#[async_trait]
impl StatsSink for KafkaSink {
    async fn publish(&self, snapshot: &StatisticsSnapshot) -> ConsumerResult<()> {
        let payload = snapshot.to_json_vec()?;
        let record = FutureRecord::<(), [u8]>::to(&self.topic).payload(&payload);

        match self.producer.send(record, Timeout::After(self.timeout)).await {
            Ok((partition, offset)) => {
                debug!(
                    "Message sent to topic {} partition {} offset {}",
                    self.topic, partition, offset
                );
                Ok(())
            }
            Err((e, _)) => Err(ConsumerError::KafkaError(e)),
        }
    }

    async fn close(&self) -> ConsumerResult<()> {
        // flush blocks the calling thread
        let producer = self.producer.clone();
        let timeout = self.timeout;
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| ConsumerError::ChannelError(format!("Producer flush task failed: {}", e)))??;
        debug!("Flushed producer for topic {}", self.topic);
        Ok(())
    }
}
