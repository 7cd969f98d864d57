// src/orchestrator/case.rs

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::errors::{PerfrunError, Result};

/// A benchmark case: `<op>:<dataflow>:<spec>:<library>:<chip>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaseDescriptor {
    pub op: String,
    pub dataflow: String,
    pub spec: String,
    pub library: String,
    pub chip: String,
}

impl CaseDescriptor {
    pub fn parse(id: &str) -> Result<Self> {
        let fields: Vec<&str> = id.split(':').collect();
        let [op, dataflow, spec, library, chip] = fields.as_slice() else {
            return Err(PerfrunError::InvalidCase {
                case: id.to_string(),
                reason: format!("expected 5 colon-separated fields, found {}", fields.len()),
            });
        };
        if let Some(pos) = fields.iter().position(|f| f.trim().is_empty()) {
            return Err(PerfrunError::InvalidCase {
                case: id.to_string(),
                reason: format!("field {} is empty", pos + 1),
            });
        }
        // The identifier doubles as a directory name in commands.
        if id.contains(|c: char| c.is_whitespace() || c == '/') {
            return Err(PerfrunError::InvalidCase {
                case: id.to_string(),
                reason: "whitespace and '/' are not allowed".to_string(),
            });
        }
        Ok(Self {
            op: op.to_string(),
            dataflow: dataflow.to_string(),
            spec: spec.to_string(),
            library: library.to_string(),
            chip: chip.to_string(),
        })
    }

    /// `<deploy>/benchmarks/<op>/<vendor>/<chip>`
    pub fn env_dir(&self, deploy_path: &Path, vendor: &str) -> PathBuf {
        deploy_path
            .join("benchmarks")
            .join(&self.op)
            .join(vendor)
            .join(&self.chip)
    }

    pub fn env_script(&self, deploy_path: &Path, vendor: &str) -> PathBuf {
        self.env_dir(deploy_path, vendor).join("env.sh")
    }

    pub fn requirements(&self, deploy_path: &Path, vendor: &str) -> PathBuf {
        self.env_dir(deploy_path, vendor).join("requirements.txt")
    }
}

impl fmt::Display for CaseDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            self.op, self.dataflow, self.spec, self.library, self.chip
        )
    }
}

impl Serialize for CaseDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_five_fields() {
        let case = CaseDescriptor::parse("resnet50:pytorch:fp32:torch:A100").unwrap();
        assert_eq!(case.op, "resnet50");
        assert_eq!(case.dataflow, "pytorch");
        assert_eq!(case.spec, "fp32");
        assert_eq!(case.library, "torch");
        assert_eq!(case.chip, "A100");
        assert_eq!(case.to_string(), "resnet50:pytorch:fp32:torch:A100");
    }

    #[test]
    fn rejects_wrong_field_counts() {
        for bad in ["", "a:b:c:d", "a:b:c:d:e:f"] {
            assert!(matches!(
                CaseDescriptor::parse(bad),
                Err(PerfrunError::InvalidCase { .. })
            ));
        }
    }

    #[test]
    fn rejects_empty_fields() {
        assert!(CaseDescriptor::parse("mm::312:nativetorch:A100").is_err());
        assert!(CaseDescriptor::parse("mm:FP32:312:native torch:A100").is_err());
        assert!(CaseDescriptor::parse("mm:FP32:312:../x:A100").is_err());
    }

    #[test]
    fn environment_files() {
        let case = CaseDescriptor::parse("mm:FP32:312:nativetorch:A100").unwrap();
        assert_eq!(
            case.env_script(Path::new("/opt/perf"), "nvidia"),
            PathBuf::from("/opt/perf/benchmarks/mm/nvidia/A100/env.sh")
        );
        assert_eq!(
            case.requirements(Path::new("/opt/perf"), "nvidia"),
            PathBuf::from("/opt/perf/benchmarks/mm/nvidia/A100/requirements.txt")
        );
    }
}
