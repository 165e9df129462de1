#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use budget_rs::config::GridDims;

/// Builds MODFLOW cell-by-cell budget files byte by byte.
pub struct CbcWriter {
    grid: GridDims,
    double: bool,
    bytes: Vec<u8>,
}

impl CbcWriter {
    pub fn single(grid: GridDims) -> Self {
        CbcWriter {
            grid,
            double: false,
            bytes: Vec::new(),
        }
    }

    pub fn double(grid: GridDims) -> Self {
        CbcWriter {
            grid,
            double: true,
            bytes: Vec::new(),
        }
    }

    fn int(&mut self, v: i32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn real(&mut self, v: f64) {
        if self.double {
            self.bytes.extend_from_slice(&v.to_le_bytes());
        } else {
            self.bytes.extend_from_slice(&(v as f32).to_le_bytes());
        }
    }

    fn text(&mut self, text: &str) {
        let mut label = [b' '; 16];
        let bytes = text.as_bytes();
        label[16 - bytes.len()..].copy_from_slice(bytes);
        self.bytes.extend_from_slice(&label);
    }

    fn header(&mut self, kstp: i32, kper: i32, text: &str, compact: bool) {
        self.int(kstp);
        self.int(kper);
        self.text(text);
        self.int(self.grid.cols as i32);
        self.int(self.grid.rows as i32);
        let nlay = self.grid.layers as i32;
        self.int(if compact { -nlay } else { nlay });
    }

    fn compact_header(&mut self, kstp: i32, kper: i32, text: &str, imeth: i32, totim: f64) {
        self.header(kstp, kper, text, true);
        self.int(imeth);
        self.real(1.0);
        self.real(totim);
        self.real(totim);
    }

    /// Non-compact record: the full 3D array, no second header.
    pub fn full_array(mut self, kstp: i32, kper: i32, text: &str, values: &[f64]) -> Self {
        assert_eq!(values.len(), self.grid.cell_count());
        self.header(kstp, kper, text, false);
        for v in values {
            self.real(*v);
        }
        self
    }

    /// Compact list of (1-based node, q) entries.
    pub fn list(mut self, kstp: i32, kper: i32, text: &str, entries: &[(i32, f64)]) -> Self {
        self.compact_header(kstp, kper, text, 2, kstp as f64);
        self.int(entries.len() as i32);
        for (node, q) in entries {
            self.int(*node);
            self.real(*q);
        }
        self
    }

    /// Compact list with auxiliary columns.
    pub fn aux_list(
        mut self,
        kstp: i32,
        kper: i32,
        text: &str,
        aux: &[&str],
        entries: &[(i32, Vec<f64>)],
    ) -> Self {
        self.compact_header(kstp, kper, text, 5, kstp as f64);
        self.int(aux.len() as i32 + 1);
        for name in aux {
            self.text(name);
        }
        self.int(entries.len() as i32);
        for (node, values) in entries {
            assert_eq!(values.len(), aux.len() + 1);
            self.int(*node);
            for v in values {
                self.real(*v);
            }
        }
        self
    }

    /// Layer indicator array (1-based) followed by one value per (row, col).
    pub fn layer_indicator(
        mut self,
        kstp: i32,
        kper: i32,
        text: &str,
        layers: &[i32],
        values: &[f64],
    ) -> Self {
        let per_layer = self.grid.cells_per_layer();
        assert_eq!(layers.len(), per_layer);
        assert_eq!(values.len(), per_layer);
        self.compact_header(kstp, kper, text, 3, kstp as f64);
        for l in layers {
            self.int(*l);
        }
        for v in values {
            self.real(*v);
        }
        self
    }

    /// Top-layer array, one value per (row, col).
    pub fn top_layer(mut self, kstp: i32, kper: i32, text: &str, values: &[f64]) -> Self {
        assert_eq!(values.len(), self.grid.cells_per_layer());
        self.compact_header(kstp, kper, text, 4, kstp as f64);
        for v in values {
            self.real(*v);
        }
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn write(self, path: &Path) {
        fs::write(path, self.bytes).expect("write budget file");
    }
}

pub fn budget_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}
