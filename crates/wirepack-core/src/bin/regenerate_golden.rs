use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use serde_json::json;
use wirepack_core::{Layout, LayoutSchema, Packet, hex};

fn main() -> ExitCode {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> Result<(), String> {
    let root = PathBuf::from("tests").join("golden");
    let entries =
        fs::read_dir(&root).map_err(|err| format!("failed to read {}: {}", root.display(), err))?;

    for entry in entries {
        let entry = entry.map_err(|err| format!("failed to read entry: {}", err))?;
        let path = entry.path();
        if !path.is_dir() || !path.join("input.hex").exists() {
            continue;
        }
        regenerate_one(&path)?;
    }

    Ok(())
}

fn load_layout(path: &Path) -> Result<Arc<Layout>, String> {
    let text = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {}", path.display(), err))?;
    let layout = LayoutSchema::from_json(&text)
        .and_then(|schema| schema.to_layout())
        .map_err(|err| format!("{}: {}", path.display(), err))?;
    Ok(Arc::new(layout))
}

fn regenerate_one(dir: &Path) -> Result<(), String> {
    let layout = load_layout(&dir.join("layout.json"))?;
    let input_path = dir.join("input.hex");
    let input = fs::read_to_string(&input_path)
        .map_err(|err| format!("failed to read {}: {}", input_path.display(), err))?;
    let bytes =
        hex::decode(&input).map_err(|err| format!("{}: {}", input_path.display(), err))?;

    let nested_path = dir.join("nested.json");
    let nested = if nested_path.exists() {
        Some(load_layout(&nested_path)?)
    } else {
        None
    };

    let decoded = Packet::from_bytes(&layout, &bytes).and_then(|mut packet| {
        if let Some(nested) = &nested {
            packet.decode_payload(nested)?;
        }
        Ok(packet)
    });
    let value = match decoded {
        Ok(packet) => json!({ "status": "decoded", "packet": packet }),
        Err(err) if err.is_need_data() => json!({ "status": "need_data", "error": err.to_string() }),
        Err(err) => json!({ "status": "error", "error": err.to_string() }),
    };

    let output = dir.join("expected.json");
    let json = serde_json::to_string_pretty(&value)
        .map_err(|err| format!("JSON serialization failed: {}", err))?;
    fs::write(&output, json)
        .map_err(|err| format!("failed to write {}: {}", output.display(), err))?;
    Ok(())
}
