//! Generates the `freighter.v1.Freighter` gRPC server and client stubs.
//!
//! Message types are declared by hand with `prost` derives in `src/proto.rs`, so only the service
//! plumbing is generated here and no `protoc` is needed at build time.

fn main() {
    let method = |name: &str, route: &str, input: &str, output: &str| {
        tonic_build::manual::Method::builder()
            .name(name)
            .route_name(route)
            .input_type(input)
            .output_type(output)
            .codec_path("tonic::codec::ProstCodec")
            .build()
    };

    let service = tonic_build::manual::Service::builder()
        .name("Freighter")
        .package("freighter.v1")
        .method(method(
            "get_file",
            "GetFile",
            "crate::proto::FileRequest",
            "crate::proto::FileReply",
        ))
        .method(method(
            "get_dir",
            "GetDir",
            "crate::proto::DirRequest",
            "crate::proto::DirReply",
        ))
        .build();

    tonic_build::manual::Builder::new().compile(&[service]);

    println!("cargo:rerun-if-changed=build.rs");
}
