//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter            | Implements    | Connects to                     |
//! |--------------------|---------------|---------------------------------|
//! | `config_file`      | ConfigPort    | JSON file on disk               |
//! | `console_logger`   | (subscriber)  | stderr via `tracing_subscriber` |
//! | `history_file`     | HistorySink   | Append-only CSV log             |
//! | `log_sink`         | EventSink     | `log` facade                    |
//! | `operator_console` | (parser)      | `!` lines → OperatorCommand     |
//! | `serial_link`      | ActuationLink | `PWM n` lines on any writer     |
//! |                    | (reader)      | Distance lines → SampleFeed     |
//! | `time`             | Clock         | `Instant` / `chrono::Utc`       |

pub mod config_file;
pub mod console_logger;
pub mod history_file;
pub mod log_sink;
pub mod operator_console;
pub mod serial_link;
pub mod time;
