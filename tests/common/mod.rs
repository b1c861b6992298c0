use std::fs;
use std::path::{Path, PathBuf};

use enrolment_pipeline::{AnalyticsConfig, DatasetKind, PipelineConfig};
use tempfile::TempDir;

pub const ENROLMENT_HEADER: &str = "date,state,district,pincode,age_0_5,age_5_17,age_18_greater";
pub const DEMOGRAPHIC_HEADER: &str = "date,state,district,pincode,demo_age_5_17,demo_age_17_";
pub const BIOMETRIC_HEADER: &str = "date,state,district,pincode,bio_age_5_17,bio_age_17_";

/// Raw and processed directories backed by one temporary root
pub struct Fixture {
    _root: TempDir,
    pub raw_dir: PathBuf,
    pub out_dir: PathBuf,
}

impl Fixture {
    #[must_use]
    pub fn new() -> Self {
        let root = TempDir::new().expect("create temp dir");
        let raw_dir = root.path().join("raw");
        let out_dir = root.path().join("processed");
        fs::create_dir_all(&raw_dir).expect("create raw dir");
        Self {
            _root: root,
            raw_dir,
            out_dir,
        }
    }

    /// Write one CSV file with `header` and `rows` into the category directory
    pub fn write_csv(&self, kind: DatasetKind, file: &str, header: &str, rows: &[&str]) -> PathBuf {
        let dir = kind.source_dir(&self.raw_dir);
        fs::create_dir_all(&dir).expect("create category dir");
        let path = dir.join(file);
        let mut content = String::from(header);
        content.push('\n');
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        fs::write(&path, content).expect("write csv");
        path
    }

    #[must_use]
    pub fn config(&self) -> PipelineConfig {
        PipelineConfig::builder()
            .raw_dir(&self.raw_dir)
            .output_dir(&self.out_dir)
            .threads(2)
            .show_progress(false)
            .build()
    }

    #[must_use]
    pub fn eager_config(&self) -> PipelineConfig {
        let analytics = AnalyticsConfig {
            eager: true,
            ..AnalyticsConfig::default()
        };
        PipelineConfig::builder()
            .raw_dir(&self.raw_dir)
            .output_dir(&self.out_dir)
            .threads(2)
            .show_progress(false)
            .analytics(analytics)
            .build()
    }
}

/// A small national dataset: six states, a few districts each
pub fn write_national(fixture: &Fixture) {
    fixture.write_csv(
        DatasetKind::Enrolment,
        "enrolment_part1.csv",
        ENROLMENT_HEADER,
        &[
            "01-03-2025,Westbengal,Kolkata,700001,10,20,5",
            "01-03-2025,West Bengal,Howrah,711101,4,6,1",
            "01-03-2025,Kerala,Ernakulam,682001,30,12,3",
            "02-03-2025,Kerala,Kollam,691001,2,1,0",
            "02-03-2025,Goa,North Goa,403001,3,2,1",
            "02-03-2025,Assam,Kamrup,781001,8,9,2",
        ],
    );
    fixture.write_csv(
        DatasetKind::Enrolment,
        "enrolment_part2.csv",
        ENROLMENT_HEADER,
        &[
            "03-03-2025,Orissa,Khordha,751001,12,14,4",
            "03-03-2025,Punjab,Ludhiana,141001,9,11,2",
            "03-03-2025,Punjab,Amritsar,143001,5,3,1",
        ],
    );
    fixture.write_csv(
        DatasetKind::DemographicUpdate,
        "demographic.csv",
        DEMOGRAPHIC_HEADER,
        &[
            "01-03-2025,West Bengal,Kolkata,700001,3,40",
            "02-03-2025,Kerala,Ernakulam,682001,1,8",
        ],
    );
    fixture.write_csv(
        DatasetKind::BiometricUpdate,
        "biometric.csv",
        BIOMETRIC_HEADER,
        &[
            "01-03-2025,West Bengal,Kolkata,700001,15,2",
            "02-03-2025,Kerala,Ernakulam,682001,20,5",
            "02-03-2025,Assam,Kamrup,781001,4,1",
            "03-03-2025,Odisha,Khordha,751001,7,0",
            "03-03-2025,Punjab,Ludhiana,141001,2,2",
        ],
    );
}

#[must_use]
pub fn read_bytes(path: &Path) -> Vec<u8> {
    fs::read(path).expect("read output file")
}
