fn main() -> Result<(), Box<dyn std::error::Error>> {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        // REST proxy handlers relay these payloads as JSON verbatim.
        .type_attribute(".tripify.v1", "#[derive(serde::Serialize)]")
        .compile_protos(&["proto/tripify.proto"], &["proto"])?;
    Ok(())
}
