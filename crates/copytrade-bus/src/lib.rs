//! Signal wire format and Kafka publisher.
//!
//! Signals are encoded as `bus.v1.Signal` protobuf messages (see
//! `proto/bus/v1/signal.proto`) and written to Kafka keyed by influencer id,
//! so every influencer's signals land on one partition in order.

pub mod error;
pub mod proto;
pub mod publisher;

pub use error::{BusError, BusResult};
pub use proto::{decode_signal, v1, SignalRecord};
pub use publisher::{
    DynSignalSink, KafkaSignalPublisher, MockSignalSink, PublisherConfig, SignalSink,
};
