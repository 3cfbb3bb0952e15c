//! Wire types for the `freighter.v1.Freighter` service.
//!
//! ```protobuf
//! service Freighter {
//!   rpc GetFile (FileRequest) returns (FileReply);
//!   rpc GetDir (DirRequest) returns (DirReply);
//! }
//! ```
#![allow(clippy::all, unused_qualifications)]

/// Request for the contents of a single file within a layer.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FileRequest {
    #[prost(string, tag = "1")]
    pub container_id: String,
    #[prost(string, tag = "2")]
    pub path: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileReply {
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
}

/// Request for a directory listing. An empty path lists the layer root itself; anything else is
/// taken as a layer identifier whose archive entries are listed.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DirRequest {
    #[prost(string, tag = "1")]
    pub path: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct FileInfo {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(int64, tag = "2")]
    pub size: i64,
    #[prost(bool, tag = "3")]
    pub is_dir: bool,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DirReply {
    #[prost(message, repeated, tag = "1")]
    pub files: Vec<FileInfo>,
}

include!(concat!(env!("OUT_DIR"), "/freighter.v1.Freighter.rs"));
