//! Actor tasks that own clangd's pipes.
//!
//! - `ResponseRouter`: routes responses to pending requests via oneshot channels
//! - `Reader`: reads stdout, routes responses, answers peer requests
//! - `Writer`: writes the outbound queue to stdin, one frame at a time

mod outbound_message;
mod reader;
mod response_router;
mod writer;

pub(crate) use outbound_message::OutboundMessage;
pub(crate) use reader::{
    DiagnosticsSink, PeerDiagnostics, ReaderContext, ReaderTaskHandle, spawn_reader_task,
};
pub(crate) use response_router::{ResponseRouter, into_result};
pub(crate) use writer::{WriterTaskHandle, spawn_writer_task};
