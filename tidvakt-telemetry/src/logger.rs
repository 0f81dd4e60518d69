//! Key-value logger trait and the built-in sinks.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

/// A structured logger carrying an ordered list of key-value pairs.
///
/// Loggers are cheap to fork: `kv` clones the accumulated pairs into a new
/// logger sharing the same sink, so actors on different threads can tag
/// context independently.
pub trait Logger: Send + Sync {
    /// Returns a new logger carrying `key = value` in addition to the pairs
    /// already accumulated.
    fn kv(&self, key: &str, value: &str) -> Box<dyn Logger>;

    /// Integer convenience for [`Logger::kv`].
    fn kvi(&self, key: &str, value: i64) -> Box<dyn Logger> {
        self.kv(key, &value.to_string())
    }

    /// Float convenience for [`Logger::kv`].
    fn kvf(&self, key: &str, value: f64) -> Box<dyn Logger> {
        self.kv(key, &value.to_string())
    }

    /// Emits one record: the accumulated pairs followed by `event = msg`.
    fn event(&self, msg: &str);
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct MuteLogger;

impl Logger for MuteLogger {
    fn kv(&self, _key: &str, _value: &str) -> Box<dyn Logger> {
        Box::new(MuteLogger)
    }

    fn event(&self, _msg: &str) {}
}

/// JSON string quoting with standard escaping.
fn quote(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}

/// Writes one JSON object per line, `\n` terminated.
///
/// Keys appear in insertion order, caller pairs first, `event` last. The
/// writer is shared behind a mutex so forked loggers interleave whole lines.
pub struct JsonLogger<W> {
    out: Arc<Mutex<W>>,
    pairs: Vec<(String, String)>,
}

impl<W: Write + Send + 'static> JsonLogger<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
            pairs: Vec::new(),
        }
    }
}

impl<W: Write + Send + 'static> Logger for JsonLogger<W> {
    fn kv(&self, key: &str, value: &str) -> Box<dyn Logger> {
        let mut pairs = self.pairs.clone();
        pairs.push((key.to_string(), value.to_string()));
        Box::new(Self {
            out: Arc::clone(&self.out),
            pairs,
        })
    }

    fn event(&self, msg: &str) {
        let mut line = String::with_capacity(64);
        line.push('{');
        for (key, value) in &self.pairs {
            line.push_str(&quote(key));
            line.push(':');
            line.push_str(&quote(value));
            line.push(',');
        }
        line.push_str("\"event\":");
        line.push_str(&quote(msg));
        line.push_str("}\n");
        let _ = self.out.lock().write_all(line.as_bytes());
    }
}

/// Writes tab-separated `key="value"` lines.
pub struct PrettyLogger<W> {
    out: Arc<Mutex<W>>,
    pairs: Vec<(String, String)>,
}

impl<W: Write + Send + 'static> PrettyLogger<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
            pairs: Vec::new(),
        }
    }
}

impl<W: Write + Send + 'static> Logger for PrettyLogger<W> {
    fn kv(&self, key: &str, value: &str) -> Box<dyn Logger> {
        let mut pairs = self.pairs.clone();
        pairs.push((key.to_string(), value.to_string()));
        Box::new(Self {
            out: Arc::clone(&self.out),
            pairs,
        })
    }

    fn event(&self, msg: &str) {
        let mut line = String::with_capacity(64);
        for (key, value) in &self.pairs {
            line.push_str(key);
            line.push('=');
            line.push_str(&format!("{value:?}"));
            line.push('\t');
        }
        line.push_str(&format!("event={msg:?}\n"));
        let _ = self.out.lock().write_all(line.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A clonable in-memory writer so tests can read back what a forked
    /// logger wrote.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn json_logger_emits_one_object_per_line() {
        let buf = SharedBuf::default();
        let log = JsonLogger::new(buf.clone());
        log.kv("actor", "fast").event("woke up");
        log.kv("actor", "slow").event("went to sleep");

        assert_eq!(
            buf.contents(),
            "{\"actor\":\"fast\",\"event\":\"woke up\"}\n\
             {\"actor\":\"slow\",\"event\":\"went to sleep\"}\n"
        );
    }

    #[test]
    fn json_logger_keeps_insertion_order() {
        let buf = SharedBuf::default();
        let log = JsonLogger::new(buf.clone());
        log.kv("z", "1").kv("a", "2").kvi("n", -3).event("done");

        assert_eq!(
            buf.contents(),
            "{\"z\":\"1\",\"a\":\"2\",\"n\":\"-3\",\"event\":\"done\"}\n"
        );
    }

    #[test]
    fn json_logger_escapes_values() {
        let buf = SharedBuf::default();
        let log = JsonLogger::new(buf.clone());
        log.kv("msg", "say \"hi\"\n").event("quoted");

        assert_eq!(
            buf.contents(),
            "{\"msg\":\"say \\\"hi\\\"\\n\",\"event\":\"quoted\"}\n"
        );
    }

    #[test]
    fn kv_does_not_mutate_parent() {
        let buf = SharedBuf::default();
        let log = JsonLogger::new(buf.clone());
        let _child = log.kv("extra", "pair");
        log.event("bare");

        assert_eq!(buf.contents(), "{\"event\":\"bare\"}\n");
    }

    #[test]
    fn pretty_logger_quotes_values() {
        let buf = SharedBuf::default();
        let log = PrettyLogger::new(buf.clone());
        log.kv("actor", "slow").kvf("rate", 0.5).event("tick");

        assert_eq!(
            buf.contents(),
            "actor=\"slow\"\trate=\"0.5\"\tevent=\"tick\"\n"
        );
    }

    #[test]
    fn mute_logger_swallows_everything() {
        let log = MuteLogger;
        // Should simply not blow up, whatever the chain.
        log.kv("a", "b").kvi("c", 1).event("nothing");
    }
}
