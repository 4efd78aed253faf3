use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSet {
    pub version: Option<u32>,
    /// Template network document the runs are applied to
    pub network_file: Option<String>,
    #[serde(default)]
    pub defaults: RunDefaults,
    #[serde(default)]
    pub runs: Vec<RunSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDefaults {
    #[serde(default = "default_load_fraction")]
    pub ci_load_fraction: f64,
    #[serde(default)]
    pub technology_palette: Vec<String>,
    #[serde(default = "default_cfe_scores")]
    pub cfe_scores: Vec<f64>,
    #[serde(default = "default_excess_ratio")]
    pub max_excess_ratio: f64,
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub mode: MatchingMode,
}

fn default_load_fraction() -> f64 {
    0.05
}

fn default_cfe_scores() -> Vec<f64> {
    vec![1.0]
}

fn default_excess_ratio() -> f64 {
    0.2
}

fn default_tolerance() -> f64 {
    0.01
}

fn default_max_iterations() -> usize {
    100
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            ci_load_fraction: default_load_fraction(),
            technology_palette: Vec::new(),
            cfe_scores: default_cfe_scores(),
            max_excess_ratio: default_excess_ratio(),
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            mode: MatchingMode::default(),
        }
    }
}

/// Temporal resolution of the matching target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingMode {
    /// 24/7 matching through the grid-CFE fixed point
    #[default]
    Hourly,
    /// Volumetric matching over the whole horizon, single solve
    Annual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    pub name: String,
    pub description: Option<String>,
    /// Parent bus names that each get a consumer system
    pub buses_with_ci_load: Vec<String>,
    pub ci_load_fraction: Option<f64>,
    #[serde(default)]
    pub technology_palette: Option<Vec<String>>,
    #[serde(default)]
    pub cfe_scores: Option<Vec<f64>>,
    pub max_excess_ratio: Option<f64>,
    pub tolerance: Option<f64>,
    pub max_iterations: Option<usize>,
    pub mode: Option<MatchingMode>,
}

/// A run with every field made concrete against the defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedRun {
    pub name: String,
    pub description: Option<String>,
    pub buses_with_ci_load: Vec<String>,
    pub ci_load_fraction: f64,
    pub technology_palette: Vec<String>,
    pub cfe_scores: Vec<f64>,
    pub max_excess_ratio: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub mode: MatchingMode,
}

pub fn load_run_set(path: &Path) -> Result<RunSet> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading run set '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing run set yaml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing run set json")
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing run set"),
    }
}

pub fn resolve_runs(set: &RunSet) -> Result<Vec<ResolvedRun>> {
    if set.runs.is_empty() {
        return Err(anyhow!("run set contains no runs"));
    }
    let defaults = &set.defaults;
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(set.runs.len());
    for run in &set.runs {
        if run.name.trim().is_empty() {
            return Err(anyhow!("run name cannot be empty"));
        }
        if !seen.insert(run.name.clone()) {
            return Err(anyhow!("duplicate run name '{}' in run set", run.name));
        }
        if run.buses_with_ci_load.is_empty() {
            return Err(anyhow!(
                "run '{}' must name at least one bus with C&I load",
                run.name
            ));
        }
        let candidate = ResolvedRun {
            name: run.name.clone(),
            description: run.description.clone(),
            buses_with_ci_load: run.buses_with_ci_load.clone(),
            ci_load_fraction: run.ci_load_fraction.unwrap_or(defaults.ci_load_fraction),
            technology_palette: run
                .technology_palette
                .clone()
                .unwrap_or_else(|| defaults.technology_palette.clone()),
            cfe_scores: run
                .cfe_scores
                .clone()
                .unwrap_or_else(|| defaults.cfe_scores.clone()),
            max_excess_ratio: run.max_excess_ratio.unwrap_or(defaults.max_excess_ratio),
            tolerance: run.tolerance.unwrap_or(defaults.tolerance),
            max_iterations: run.max_iterations.unwrap_or(defaults.max_iterations),
            mode: run.mode.unwrap_or(defaults.mode),
        };
        validate_run(&candidate)?;
        resolved.push(candidate);
    }
    Ok(resolved)
}

fn validate_run(run: &ResolvedRun) -> Result<()> {
    if !(0.0..=1.0).contains(&run.ci_load_fraction) {
        return Err(anyhow!(
            "run '{}': ci_load_fraction {} is outside [0, 1]",
            run.name,
            run.ci_load_fraction
        ));
    }
    if run.technology_palette.is_empty() {
        return Err(anyhow!("run '{}': technology palette is empty", run.name));
    }
    if run.cfe_scores.is_empty() {
        return Err(anyhow!("run '{}': no CFE scores given", run.name));
    }
    for score in &run.cfe_scores {
        if !(0.0..=1.0).contains(score) {
            return Err(anyhow!(
                "run '{}': CFE score {} is outside [0, 1]",
                run.name,
                score
            ));
        }
    }
    if run.max_excess_ratio < 0.0 {
        return Err(anyhow!(
            "run '{}': max_excess_ratio must be >= 0",
            run.name
        ));
    }
    if run.tolerance <= 0.0 {
        return Err(anyhow!("run '{}': tolerance must be positive", run.name));
    }
    if run.max_iterations < 2 {
        return Err(anyhow!(
            "run '{}': max_iterations must be at least 2",
            run.name
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EXAMPLE_YAML: &str = r#"
version: 1
network_file: brownfield.json
defaults:
  ci_load_fraction: 0.1
  technology_palette: [solar, onshore-wind, battery]
  cfe_scores: [0.8, 0.9, 1.0]
runs:
  - name: base
    buses_with_ci_load: [DE0]
  - name: two-sites-annual
    buses_with_ci_load: [DE0, FR0]
    ci_load_fraction: 0.25
    mode: annual
    cfe_scores: [1.0]
"#;

    fn parse(yaml: &str) -> RunSet {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let set = parse(EXAMPLE_YAML);
        let runs = resolve_runs(&set).unwrap();
        assert_eq!(runs.len(), 2);
        let base = &runs[0];
        assert_eq!(base.ci_load_fraction, 0.1);
        assert_eq!(base.cfe_scores, vec![0.8, 0.9, 1.0]);
        assert_eq!(base.mode, MatchingMode::Hourly);
        assert_eq!(base.max_iterations, 100);
        assert_eq!(base.tolerance, 0.01);

        let annual = &runs[1];
        assert_eq!(annual.ci_load_fraction, 0.25);
        assert_eq!(annual.mode, MatchingMode::Annual);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut set = parse(EXAMPLE_YAML);
        set.runs[1].name = "base".into();
        let err = resolve_runs(&set).unwrap_err();
        assert!(err.to_string().contains("duplicate run name"));
    }

    #[test]
    fn test_empty_bus_list_rejected() {
        let mut set = parse(EXAMPLE_YAML);
        set.runs[0].buses_with_ci_load.clear();
        assert!(resolve_runs(&set).is_err());
    }

    #[test]
    fn test_out_of_range_score_rejected() {
        let mut set = parse(EXAMPLE_YAML);
        set.runs[0].cfe_scores = Some(vec![1.2]);
        let err = resolve_runs(&set).unwrap_err();
        assert!(err.to_string().contains("outside [0, 1]"));
    }

    #[test]
    fn test_empty_palette_rejected() {
        let mut set = parse(EXAMPLE_YAML);
        set.defaults.technology_palette.clear();
        set.runs[0].technology_palette = None;
        assert!(resolve_runs(&set).is_err());
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml_path = dir.path().join("runs.yaml");
        let mut f = fs::File::create(&yaml_path).unwrap();
        f.write_all(EXAMPLE_YAML.as_bytes()).unwrap();
        let set = load_run_set(&yaml_path).unwrap();
        assert_eq!(set.network_file.as_deref(), Some("brownfield.json"));

        let json_path = dir.path().join("runs.json");
        let json = serde_json::to_string(&set).unwrap();
        fs::write(&json_path, json).unwrap();
        let set2 = load_run_set(&json_path).unwrap();
        assert_eq!(set2.runs.len(), 2);
    }
}
