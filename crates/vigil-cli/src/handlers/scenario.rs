//! `vigil scenario`: export the built-in todo scenario

use crate::commands::ScenarioArgs;
use crate::error::CliResult;
use crate::output::Reporter;
use vigil::todo::{todo_regression_scenario, TodoScenarioConfig};

/// YAML for the built-in scenario
pub fn render_scenario(with_baselines: bool) -> CliResult<String> {
    let mut config = TodoScenarioConfig::default();
    if !with_baselines {
        config = config.without_baselines();
    }
    Ok(todo_regression_scenario(&config).to_yaml()?)
}

/// Execute the scenario command
pub fn execute_scenario(args: &ScenarioArgs, reporter: &Reporter) -> CliResult<()> {
    let yaml = render_scenario(!args.no_baselines)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &yaml)?;
            reporter.info(&format!("Scenario written to {}", path.display()));
        }
        None => reporter.line(yaml.trim_end()),
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use vigil::Scenario;

    #[test]
    fn test_rendered_yaml_loads_back() {
        let yaml = render_scenario(true).unwrap();
        let scenario = Scenario::from_yaml_str(&yaml).unwrap();
        assert_eq!(scenario.name, "todo_regression");
        assert!(yaml.contains("type: compare_baseline"));
    }

    #[test]
    fn test_without_baselines() {
        let yaml = render_scenario(false).unwrap();
        assert!(!yaml.contains("compare_baseline"));
        assert!(yaml.contains("type: resolve_dialog"));
    }
}
