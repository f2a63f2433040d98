// Copyright (c) 2026 - present Nicholas D. Crosbie
// SPDX-License-Identifier: MIT

//! gotestiful-events: `go test -json` event processing for gotestiful
//!
//! This library crate turns the flat event stream produced by `go test -json`
//! into aligned, coloured report lines and an aggregate [`RunResult`].
//!
//! # Example
//!
//! ```no_run
//! use gotestiful_events::{EventProcessor, ProcessOptions, TestEvent};
//!
//! let options = ProcessOptions::new(vec!["example.com/pkg".to_string()]);
//! let mut processor = EventProcessor::new(options, |line: &str| println!("{line}"));
//!
//! let event = TestEvent::parse(r#"{"Action":"pass","Package":"example.com/pkg","Elapsed":0.2}"#)
//!     .unwrap();
//! processor.handle(event);
//!
//! let result = processor.finish();
//! assert!(result.all_passed());
//! ```

pub mod coverage;
pub mod error;
pub mod event;
pub mod processor;
pub mod reporter;

pub use coverage::{TotalCoverage, coverage_parse, total_coverage};
pub use error::EventsError;
pub use event::{Action, Package, TestEvent};
pub use processor::{EventProcessor, ProcessOptions, RunResult, process};
pub use reporter::{Reporter, Tone};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::coverage::{TotalCoverage, total_coverage};
    pub use crate::error::EventsError;
    pub use crate::event::{Action, TestEvent};
    pub use crate::processor::{EventProcessor, ProcessOptions, RunResult};
    pub use crate::reporter::Reporter;
}
