//! Remote host-management API
//!
//! [`Transport`] is the raw seam: a request goes in, a status, JSON body and
//! headers come out. [`RemoteClient`] builds the typed operations the
//! reconciler needs on top of it.

mod client;
mod http;
mod transport;

pub use client::{HostCreate, HostUpdate, OWNER_LABEL, RemoteClient, RemoteHost, folder_id};
pub use http::HttpTransport;
pub use transport::{Method, Request, Response, Transport};
