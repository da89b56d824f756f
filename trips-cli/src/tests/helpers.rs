//! Test helpers for writing trip files and stores into a scratch directory.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use crate::{CliError, TripsConfig, execute};
use tempfile::TempDir;

pub(super) const TWO_WEEKS_CSV: &str = "\
region,point_origin,point_dest,datetime,datasource
A,POINT (0.5 0.5),POINT (5 5),2023-01-30 08:00:00,cheap_mobile
A,POINT (0.5 0.5),POINT (5 5),2023-02-01 09:30:00,cheap_mobile
A,POINT (5 5),POINT (0.5 0.5),2023-02-05 18:15:00,funny_car
A,POINT (5 5),POINT (5 5),2023-02-06 07:45:00,funny_car
";

pub(super) struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    pub(super) fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root =
            Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 workspace");
        Self { _dir: dir, root }
    }

    pub(super) fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub(super) fn write_csv(&self, name: &str, contents: &str) -> Utf8PathBuf {
        let path = self.root.join(name);
        fs::write(&path, contents).expect("write csv");
        path
    }

    pub(super) fn store_path(&self) -> Utf8PathBuf {
        self.root.join("data").join("trips.db")
    }
}

pub(super) fn run_to_string(config: &TripsConfig) -> Result<String, CliError> {
    let mut out = Vec::new();
    execute(config, &mut out)?;
    Ok(String::from_utf8(out).expect("utf-8 output"))
}
