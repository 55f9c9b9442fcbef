use anyhow::Result;
use kube::api::DynamicObject;
use std::io::Write;

/// Renderer target for inspection mode. Selecting one on the CLI forces
/// dry-run: the bundle is fetched, rendered to stdout and the process exits
/// without ever talking to the target cluster.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Yaml,
    Json,
}

/// Drop fields that only describe life on the source cluster, not intent.
pub fn strip_presentation_fields(obj: &mut DynamicObject) {
    obj.metadata.managed_fields = None;
    if let Some(map) = obj.data.as_object_mut() {
        map.remove("status");
    }
}

/// Serialize the bundle to `out`, one document per entry: YAML documents
/// separated by `---`, or pretty-printed JSON.
pub fn render_bundle(
    mut objects: Vec<DynamicObject>,
    format: OutputFormat,
    out: &mut impl Write,
) -> Result<()> {
    for (i, obj) in objects.iter_mut().enumerate() {
        strip_presentation_fields(obj);
        match format {
            OutputFormat::Yaml => {
                if i > 0 {
                    writeln!(out, "---")?;
                }
                out.write_all(serde_yaml::to_string(obj)?.as_bytes())?;
            }
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *out, obj)?;
                writeln!(out)?;
            }
        }
    }
    out.flush()?;
    Ok(())
}
