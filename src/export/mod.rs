//! Schedule export formats.

mod ical;

pub use ical::{export_ical, export_ical_at};
