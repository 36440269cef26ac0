// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Protobuf wire messages used by the binary codec.
//!
//! The messages are declared with `prost` derives rather than generated from a
//! `.proto` file; the field tags below are the wire contract and must not be
//! renumbered.

pub mod wire_v1 {
    /// Outer frame of every protobuf payload.
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Envelope {
        #[prost(string, tag = "1")]
        pub codec: ::prost::alloc::string::String,
        #[prost(uint32, tag = "2")]
        pub version: u32,
        /// 1 = record batch, 2 = completion signal
        #[prost(uint32, tag = "3")]
        pub kind: u32,
        #[prost(bytes = "vec", tag = "4")]
        pub body: ::prost::alloc::vec::Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Record {
        #[prost(double, tag = "1")]
        pub observable: f64,
        #[prost(double, tag = "2")]
        pub weight: f64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RecordBatch {
        #[prost(string, tag = "1")]
        pub category: ::prost::alloc::string::String,
        #[prost(message, repeated, tag = "2")]
        pub records: ::prost::alloc::vec::Vec<Record>,
        #[prost(string, optional, tag = "3")]
        pub color: ::core::option::Option<::prost::alloc::string::String>,
        #[prost(string, optional, tag = "4")]
        pub label: ::core::option::Option<::prost::alloc::string::String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CompletionSignal {
        #[prost(string, tag = "1")]
        pub sender_id: ::prost::alloc::string::String,
        #[prost(uint64, tag = "2")]
        pub seconds: u64,
        #[prost(uint32, tag = "3")]
        pub nanos: u32,
    }

    pub const KIND_RECORD_BATCH: u32 = 1;
    pub const KIND_COMPLETION_SIGNAL: u32 = 2;
}
