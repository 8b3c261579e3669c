//! JSON snapshot of collaborator records
//!
//! The host application owns students, courses, grades and campaigns. A
//! dataset file lets the CLI and tests stand those records up in memory.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::campaign::{Campaign, VisitorEnrollment, VisitorKey};
use crate::domain::student::{Course, Enrollment, Grade, Student};
use crate::error::Result;

/// A visitor enrollment as written in a dataset file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorEnrollmentRecord {
    pub visitor: VisitorKey,
    #[serde(flatten)]
    pub enrollment: VisitorEnrollment,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub students: Vec<Student>,
    pub courses: Vec<Course>,
    pub enrollments: Vec<Enrollment>,
    pub grades: Vec<Grade>,
    pub campaigns: Vec<Campaign>,
    pub visitor_enrollments: Vec<VisitorEnrollmentRecord>,
}

impl Dataset {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
