fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Generated code is committed under src/, so a normal build never needs
    // protoc. Set CLIPSTREAM_PROTO_REGEN=1 to regenerate after editing
    // proto/video.proto.
    println!("cargo:rerun-if-env-changed=CLIPSTREAM_PROTO_REGEN");
    if std::env::var_os("CLIPSTREAM_PROTO_REGEN").is_none() {
        return Ok(());
    }

    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .type_attribute(".", "#[derive(serde::Serialize, serde::Deserialize)]")
        .out_dir("src")
        .compile_protos(&["proto/video.proto"], &["proto"])?;

    println!("cargo:rerun-if-changed=proto/video.proto");

    Ok(())
}
