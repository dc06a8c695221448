use anyhow::Result;

use conveyor_engine::registry::StageDescriptor;
use conveyor_engine::StageRegistry;

/// Execute the `stages` command: list every built-in stage by capability.
pub fn execute(json: bool) -> Result<()> {
    let stages = StageRegistry::builtin().describe();
    if json {
        println!("{}", serde_json::to_string_pretty(&stages)?);
    } else {
        print!("{}", render_text(&stages));
    }
    Ok(())
}

fn render_text(stages: &[StageDescriptor]) -> String {
    let mut out = String::new();
    let mut current = None;
    for stage in stages {
        if current != Some(stage.kind) {
            out.push_str(&format!("{}:\n", stage.kind));
            current = Some(stage.kind);
        }
        out.push_str(&format!("  {}\n", stage.name));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_listing_groups_by_kind() {
        let text = render_text(&StageRegistry::builtin().describe());
        assert_eq!(text, "extract:\n  csv\ntransform:\n  drop_columns\nload:\n  csv\n");
    }

    #[test]
    fn test_json_listing_names_kind_and_stage() {
        let json = serde_json::to_value(StageRegistry::builtin().describe()).unwrap();
        assert_eq!(json[0]["name"], "csv");
        assert_eq!(json[0]["kind"], "extract");
        assert_eq!(json.as_array().unwrap().len(), 3);
    }
}
