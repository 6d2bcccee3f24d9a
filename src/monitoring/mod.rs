/*!
 * Monitoring
 * Structured tracing setup and spans
 */

pub mod tracer;

pub use tracer::{generate_trace_id, init_tracing, PipelineSpan};
