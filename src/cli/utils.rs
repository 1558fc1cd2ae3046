use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::directory::Folder;

/// Output a success message in the appropriate format
pub fn output_success(output_format: &OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let (Some(Value::Object(extra)), Some(target)) = (data, response.as_object_mut()) {
                target.extend(extra);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output an error message in the appropriate format
pub fn output_error(output_format: &OutputFormat, message: &str, error_code: Option<&str>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(code) = error_code {
                response["error_code"] = json!(code);
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("Error: {}", message);
        }
    }
    Ok(())
}

/// Indented listing of a folder tree, folders before files
pub fn tree_lines(root: &Folder) -> Vec<String> {
    let mut lines = Vec::new();
    push_folder(root, 0, &mut lines);
    lines
}

fn push_folder(folder: &Folder, depth: usize, lines: &mut Vec<String>) {
    let indent = "  ".repeat(depth);
    lines.push(format!("{}{}/", indent, folder.name));
    for child in &folder.folders {
        push_folder(child, depth + 1, lines);
    }
    for file in &folder.files {
        let size = file.size.as_deref().unwrap_or("-");
        lines.push(format!("{}  {} [{}] {}", indent, file.name, size, file.key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::FileEntry;
    use chrono::Utc;

    #[test]
    fn tree_lines_nest_folders_and_files() {
        let mut root = Folder::root();
        root.create_folder(&[] as &[&str], "Drawings", Utc::now()).unwrap();
        root.add_file(
            &["Drawings"],
            FileEntry {
                name: "site.pdf".to_string(),
                size: Some("2048".to_string()),
                uploaded_at: None,
                key: "projects/p1/site.pdf".to_string(),
            },
        )
        .unwrap();

        assert_eq!(
            tree_lines(&root),
            vec![
                "root/".to_string(),
                "  Drawings/".to_string(),
                "    site.pdf [2048] projects/p1/site.pdf".to_string(),
            ]
        );
    }
}
