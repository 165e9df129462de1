//! Reader for MODFLOW cell-by-cell budget files (`.cbc`, `.ccf`, `.bud`).
//!
//! The file is an unformatted stream of records, each a header followed by
//! a body whose layout depends on the storage method. Opening the file walks
//! every header once and remembers where each body starts; bodies are only
//! decoded when [`BudgetSource::records`] asks for them.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{GridDims, Precision};
use crate::error::{BudgetError, BudgetResult};
use crate::io::{BudgetSource, RawRecord, TimeStepKey, normalize_name};

const CBC_IO_BUFFER_BYTES: usize = 1024 * 1024;
const TEXT_LEN: usize = 16;
// kstp, kper, text, ncol, nrow, nlay
const HEADER_BYTES: u64 = 4 + 4 + TEXT_LEN as u64 + 4 + 4 + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RealWidth {
    Single,
    Double,
}

impl RealWidth {
    fn bytes(self) -> u64 {
        match self {
            RealWidth::Single => 4,
            RealWidth::Double => 8,
        }
    }

    fn precision(self) -> Precision {
        match self {
            RealWidth::Single => Precision::Single,
            RealWidth::Double => Precision::Double,
        }
    }
}

/// How a record body is laid out (the `imeth` code of a compact header).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMethod {
    /// Codes 0 and 1: one real per cell of the whole grid.
    FullArray,
    /// Code 2: `nlist` pairs of node number and value.
    List { nlist: usize },
    /// Code 3: a layer number per (row, col), then one real per (row, col).
    LayerIndicator,
    /// Code 4: one real per (row, col) of the top layer.
    TopLayer,
    /// Code 5: like `List` but each entry carries `naux` auxiliary values.
    AuxList { naux: usize, nlist: usize },
}

impl StorageMethod {
    pub fn code(&self) -> i32 {
        match self {
            StorageMethod::FullArray => 1,
            StorageMethod::List { .. } => 2,
            StorageMethod::LayerIndicator => 3,
            StorageMethod::TopLayer => 4,
            StorageMethod::AuxList { .. } => 5,
        }
    }
}

/// Header of a single budget record plus the position of its data.
#[derive(Debug, Clone)]
pub struct RecordHeader {
    pub key: TimeStepKey,
    /// Label exactly as written, padding included.
    pub text: String,
    pub dims: GridDims,
    pub method: StorageMethod,
    pub aux_names: Vec<String>,
    pub delt: Option<f64>,
    pub pertim: Option<f64>,
    pub totim: Option<f64>,
    data_offset: u64,
}

impl RecordHeader {
    pub fn name(&self) -> String {
        normalize_name(&self.text)
    }
}

#[derive(Debug)]
pub struct CellBudgetFile {
    path: PathBuf,
    file: BufReader<File>,
    width: RealWidth,
    headers: Vec<RecordHeader>,
    steps: Vec<TimeStepKey>,
    // totim of the first header of each step, parallel to `steps`
    step_times: Vec<Option<f64>>,
    lookup: HashMap<(TimeStepKey, String), Vec<usize>>,
}

impl CellBudgetFile {
    pub fn open(path: impl Into<PathBuf>, precision: Precision) -> BudgetResult<Self> {
        let path = path.into();
        let file = File::open(&path).map_err(|source| BudgetError::Open {
            path: path.clone(),
            source,
        })?;
        let file_len = file.metadata()?.len();
        let mut file = BufReader::with_capacity(CBC_IO_BUFFER_BYTES, file);

        let (width, headers) = match precision {
            Precision::Single => (
                RealWidth::Single,
                build_index(&mut file, file_len, RealWidth::Single)?,
            ),
            Precision::Double => (
                RealWidth::Double,
                build_index(&mut file, file_len, RealWidth::Double)?,
            ),
            Precision::Auto => match build_index(&mut file, file_len, RealWidth::Single) {
                Ok(headers) => (RealWidth::Single, headers),
                Err(single_err) => {
                    debug!(error = %single_err, "single precision walk failed, trying double");
                    match build_index(&mut file, file_len, RealWidth::Double) {
                        Ok(headers) => (RealWidth::Double, headers),
                        Err(_) => return Err(single_err),
                    }
                }
            },
        };

        let mut steps = Vec::new();
        let mut step_times = Vec::new();
        let mut seen = HashSet::new();
        let mut lookup: HashMap<(TimeStepKey, String), Vec<usize>> = HashMap::new();
        for (i, header) in headers.iter().enumerate() {
            if seen.insert(header.key) {
                steps.push(header.key);
                step_times.push(header.totim);
            }
            lookup.entry((header.key, header.name())).or_default().push(i);
        }

        info!(
            path = %path.display(),
            records = headers.len(),
            steps = steps.len(),
            precision = ?width,
            "indexed budget file"
        );

        Ok(CellBudgetFile {
            path,
            file,
            width,
            headers,
            steps,
            step_times,
            lookup,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn precision(&self) -> Precision {
        self.width.precision()
    }

    pub fn headers(&self) -> &[RecordHeader] {
        &self.headers
    }

    /// Grid dimensions stated by the record headers, `None` for an empty file.
    pub fn grid(&self) -> Option<GridDims> {
        self.headers.first().map(|h| h.dims)
    }

    /// Simulation time of each step, for files written with compact headers.
    pub fn times(&self) -> Vec<Option<f64>> {
        self.step_times.clone()
    }

    fn read_body(&mut self, index: usize) -> BudgetResult<Vec<RawRecord>> {
        let header = &self.headers[index];
        let dims = header.dims;
        let method = header.method;
        let width = self.width;
        self.file.seek(SeekFrom::Start(header.data_offset))?;
        let file = &mut self.file;

        let per_layer = dims.cells_per_layer();
        let mut records = Vec::new();
        match method {
            StorageMethod::FullArray => {
                for cell in 0..dims.cell_count() {
                    let value = read_real(file, width)?;
                    if value != 0.0 {
                        records.push(RawRecord::new(cell as i64, value));
                    }
                }
            }
            StorageMethod::List { nlist } => {
                records.reserve(nlist);
                for _ in 0..nlist {
                    let node = read_i32(file)?;
                    let value = read_real(file, width)?;
                    records.push(RawRecord::new(node as i64 - 1, value));
                }
            }
            StorageMethod::LayerIndicator => {
                let mut layers = Vec::with_capacity(per_layer);
                for _ in 0..per_layer {
                    layers.push(read_i32(file)?);
                }
                for (rc, layer) in layers.into_iter().enumerate() {
                    let value = read_real(file, width)?;
                    if value != 0.0 {
                        let cell_id = (layer as i64 - 1) * per_layer as i64 + rc as i64;
                        records.push(RawRecord::new(cell_id, value));
                    }
                }
            }
            StorageMethod::TopLayer => {
                for rc in 0..per_layer {
                    let value = read_real(file, width)?;
                    if value != 0.0 {
                        records.push(RawRecord::new(rc as i64, value));
                    }
                }
            }
            StorageMethod::AuxList { naux, nlist } => {
                records.reserve(nlist);
                for _ in 0..nlist {
                    let node = read_i32(file)?;
                    let mut values = Vec::with_capacity(naux + 1);
                    for _ in 0..=naux {
                        values.push(read_real(file, width)?);
                    }
                    records.push(RawRecord {
                        cell_id: node as i64 - 1,
                        values,
                    });
                }
            }
        }
        Ok(records)
    }
}

impl BudgetSource for CellBudgetFile {
    fn time_steps(&self) -> Vec<TimeStepKey> {
        self.steps.clone()
    }

    fn component_names(&self) -> BTreeSet<String> {
        self.headers.iter().map(|h| h.name()).collect()
    }

    fn records(
        &mut self,
        key: TimeStepKey,
        component: &str,
    ) -> BudgetResult<Option<Vec<RawRecord>>> {
        let Some(indices) = self.lookup.get(&(key, normalize_name(component))).cloned() else {
            return Ok(None);
        };
        let mut records = Vec::new();
        for index in indices {
            records.extend(self.read_body(index)?);
        }
        Ok(Some(records))
    }
}

fn build_index(
    file: &mut BufReader<File>,
    file_len: u64,
    width: RealWidth,
) -> BudgetResult<Vec<RecordHeader>> {
    file.seek(SeekFrom::Start(0))?;
    let mut headers: Vec<RecordHeader> = Vec::new();
    let mut pos = 0u64;

    while pos < file_len {
        if file_len - pos < HEADER_BYTES {
            return Err(BudgetError::Format(format!(
                "truncated record header at byte {}",
                pos
            )));
        }
        let header = read_header(file, width, file_len).map_err(|err| match err {
            BudgetError::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                BudgetError::Format(format!("truncated record header at byte {}", pos))
            }
            other => other,
        })?;
        if let Some(first) = headers.first() {
            if first.dims != header.dims {
                return Err(BudgetError::Format(format!(
                    "record '{}' at step {} has grid {}, earlier records have {}",
                    header.text.trim(),
                    header.key,
                    header.dims,
                    first.dims
                )));
            }
        }
        let data_bytes = data_len(&header, width)?;
        let end = header
            .data_offset
            .checked_add(data_bytes)
            .filter(|end| *end <= file_len)
            .ok_or_else(|| {
                BudgetError::Format(format!(
                    "record '{}' at step {} extends past end of file",
                    header.text.trim(),
                    header.key
                ))
            })?;
        file.seek(SeekFrom::Start(end))?;
        pos = end;
        headers.push(header);
    }

    debug!(records = headers.len(), ?width, "budget index built");
    Ok(headers)
}

fn read_header(
    file: &mut BufReader<File>,
    width: RealWidth,
    file_len: u64,
) -> BudgetResult<RecordHeader> {
    let kstp = read_i32(file)?;
    let kper = read_i32(file)?;
    let text = read_text(file)?;
    let ncol = read_i32(file)?;
    let nrow = read_i32(file)?;
    let nlay = read_i32(file)?;

    if kstp < 1 || kper < 1 {
        return Err(BudgetError::Format(format!(
            "invalid time step {} / stress period {} in header",
            kstp, kper
        )));
    }
    if ncol < 1 || nrow < 1 || nlay == 0 {
        return Err(BudgetError::Format(format!(
            "invalid grid {} layers x {} rows x {} cols in header",
            nlay, nrow, ncol
        )));
    }
    let dims = GridDims::new(nlay.unsigned_abs() as usize, nrow as usize, ncol as usize);
    if dims.checked_cell_count().is_none() {
        return Err(BudgetError::Format(format!(
            "grid {} in header of '{}' is too large",
            dims,
            text.trim()
        )));
    }
    let key = TimeStepKey::new(kstp as usize - 1, kper as usize - 1);

    let mut delt = None;
    let mut pertim = None;
    let mut totim = None;
    let mut aux_names = Vec::new();

    let method = if nlay > 0 {
        StorageMethod::FullArray
    } else {
        let imeth = read_i32(file)?;
        let times = [
            read_real(file, width)?,
            read_real(file, width)?,
            read_real(file, width)?,
        ];
        if times.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(BudgetError::Format(format!(
                "implausible time values {:?} in header of '{}'",
                times,
                text.trim()
            )));
        }
        delt = Some(times[0]);
        pertim = Some(times[1]);
        totim = Some(times[2]);

        match imeth {
            0 | 1 => StorageMethod::FullArray,
            2 => StorageMethod::List {
                nlist: read_count(file, "nlist")?,
            },
            3 => StorageMethod::LayerIndicator,
            4 => StorageMethod::TopLayer,
            5 => {
                let naux = read_count(file, "naux+1")?.checked_sub(1).ok_or_else(|| {
                    BudgetError::Format(format!(
                        "record '{}' declares zero values per entry",
                        text.trim()
                    ))
                })?;
                for _ in 0..naux {
                    aux_names.push(read_text(file)?.trim().to_string());
                }
                StorageMethod::AuxList {
                    naux,
                    nlist: read_count(file, "nlist")?,
                }
            }
            other => {
                return Err(BudgetError::Format(format!(
                    "unsupported storage method {} for '{}'",
                    other,
                    text.trim()
                )));
            }
        }
    };

    let data_offset = file.stream_position()?;
    if data_offset > file_len {
        return Err(BudgetError::Format(format!(
            "header of '{}' runs past end of file",
            text.trim()
        )));
    }

    Ok(RecordHeader {
        key,
        text,
        dims,
        method,
        aux_names,
        delt,
        pertim,
        totim,
        data_offset,
    })
}

fn data_len(header: &RecordHeader, width: RealWidth) -> BudgetResult<u64> {
    let real = width.bytes();
    let cells = header.dims.cell_count() as u64;
    let per_layer = header.dims.cells_per_layer() as u64;
    let len = match header.method {
        StorageMethod::FullArray => cells.checked_mul(real),
        StorageMethod::List { nlist } => (nlist as u64).checked_mul(4 + real),
        StorageMethod::LayerIndicator => per_layer.checked_mul(4 + real),
        StorageMethod::TopLayer => per_layer.checked_mul(real),
        StorageMethod::AuxList { naux, nlist } => (naux as u64 + 1)
            .checked_mul(real)
            .and_then(|entry| entry.checked_add(4))
            .and_then(|entry| (nlist as u64).checked_mul(entry)),
    };
    len.ok_or_else(|| {
        BudgetError::Format(format!(
            "record '{}' at step {} declares a body too large to address",
            header.text.trim(),
            header.key
        ))
    })
}

fn read_count(file: &mut impl Read, what: &str) -> BudgetResult<usize> {
    let value = read_i32(file)?;
    usize::try_from(value)
        .map_err(|_| BudgetError::Format(format!("negative {} ({}) in header", what, value)))
}

fn read_i32(file: &mut impl Read) -> BudgetResult<i32> {
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_real(file: &mut impl Read, width: RealWidth) -> BudgetResult<f64> {
    match width {
        RealWidth::Single => {
            let mut buf = [0u8; 4];
            file.read_exact(&mut buf)?;
            Ok(f32::from_le_bytes(buf) as f64)
        }
        RealWidth::Double => {
            let mut buf = [0u8; 8];
            file.read_exact(&mut buf)?;
            Ok(f64::from_le_bytes(buf))
        }
    }
}

fn read_text(file: &mut impl Read) -> BudgetResult<String> {
    let mut buf = [0u8; TEXT_LEN];
    file.read_exact(&mut buf)?;
    if !buf.iter().all(|b| (0x20..=0x7e).contains(b)) {
        return Err(BudgetError::Format(
            "budget label is not printable ASCII".to_string(),
        ));
    }
    Ok(buf.iter().map(|&b| b as char).collect())
}
