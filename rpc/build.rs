fn main() {
    tonic_build::configure()
        .build_server(true)
        .compile(&["proto/scheduling.proto"], &["proto"])
        .unwrap_or_else(|e| panic!("scheduling protobuf compilation failed: {}", e));
}
