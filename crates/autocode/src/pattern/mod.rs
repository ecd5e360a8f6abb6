//! Code templates.
//!
//! A template is an ordered list of segments. On the wire each segment is a
//! [`RawPattern`]: a `type` tag plus an untyped `options` object. Templates
//! are validated once, when they are loaded, into typed [`Segment`]s so that
//! rendering never has to second-guess its inputs.
//!
//! | `type`    | options                                   | typed form          |
//! |-----------|-------------------------------------------|---------------------|
//! | `string`  | `value` (default `""`)                    | [`StringOptions`]   |
//! | `date`    | `format` (required)                       | [`DateOptions`]     |
//! | `field`   | `fieldCode` (required)                    | [`FieldOptions`]    |
//! | `integer` | `cycle` (default `none`), `start` (default 1), `digits` (default 5) | [`IntegerOptions`] |

mod date;
mod segment;

pub use date::*;
pub use segment::*;
