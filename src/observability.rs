use biometrics::{Collector, Counter, Moments};

pub(crate) static CLIENT_REQUESTS: Counter = Counter::new("groqchat.client.requests");
pub(crate) static CLIENT_REQUEST_ERRORS: Counter = Counter::new("groqchat.client.request_errors");

pub(crate) static STREAM_CHUNKS: Counter = Counter::new("groqchat.stream.chunks");
pub(crate) static STREAM_BYTES: Counter = Counter::new("groqchat.stream.bytes");
pub(crate) static STREAM_CANCELLATIONS: Counter = Counter::new("groqchat.stream.cancellations");
pub(crate) static STREAM_DURATION: Moments = Moments::new("groqchat.stream.duration_seconds");

pub(crate) static TYPEWRITER_CHARS: Counter = Counter::new("groqchat.typewriter.chars");

pub(crate) static STORAGE_WRITES: Counter = Counter::new("groqchat.storage.writes");
pub(crate) static STORAGE_LOAD_FAILURES: Counter = Counter::new("groqchat.storage.load_failures");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CLIENT_REQUESTS);
    collector.register_counter(&CLIENT_REQUEST_ERRORS);

    collector.register_counter(&STREAM_CHUNKS);
    collector.register_counter(&STREAM_BYTES);
    collector.register_counter(&STREAM_CANCELLATIONS);
    collector.register_moments(&STREAM_DURATION);

    collector.register_counter(&TYPEWRITER_CHARS);

    collector.register_counter(&STORAGE_WRITES);
    collector.register_counter(&STORAGE_LOAD_FAILURES);
}
