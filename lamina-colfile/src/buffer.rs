//! Tuple buffer: fixed-capacity staging that fans a row-oriented input
//! stream out into per-column batched writes.
//!
//! The row seam is boxed ([`CellValue`]), but values land in dense typed
//! vectors immediately, so draining issues exactly one batched
//! `write_values` per column — the writers' fast path. A buffer instance
//! is single-threaded: a producer fills it, then it is drained; fill and
//! drain never overlap.

use crate::bundle::AnyColumnWriter;
use crate::scheme::TypedWriter;
use lamina_core::error::{Error, Result};
use lamina_core::types::ColumnType;

/// One row cell at the type-erased seam.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    VarChar(String),
    VarBinary(Vec<u8>),
}

/// Dense per-column staging storage.
enum ColumnData {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    VarChar(Vec<String>),
    VarBinary(Vec<Vec<u8>>),
}

impl ColumnData {
    fn for_type(column_type: ColumnType, capacity: usize) -> Self {
        match column_type.storage_type() {
            ColumnType::Int8 => Self::Int8(Vec::with_capacity(capacity)),
            ColumnType::Int16 => Self::Int16(Vec::with_capacity(capacity)),
            ColumnType::Int32 => Self::Int32(Vec::with_capacity(capacity)),
            ColumnType::Int64 => Self::Int64(Vec::with_capacity(capacity)),
            ColumnType::Float32 => Self::Float32(Vec::with_capacity(capacity)),
            ColumnType::Float64 => Self::Float64(Vec::with_capacity(capacity)),
            ColumnType::VarChar => Self::VarChar(Vec::with_capacity(capacity)),
            ColumnType::VarBinary => Self::VarBinary(Vec::with_capacity(capacity)),
            ColumnType::Date | ColumnType::Time | ColumnType::Timestamp => unreachable!(),
        }
    }

    fn accepts(&self, cell: &CellValue) -> bool {
        matches!(
            (self, cell),
            (Self::Int8(_), CellValue::Int8(_))
                | (Self::Int16(_), CellValue::Int16(_))
                | (Self::Int32(_), CellValue::Int32(_))
                | (Self::Int64(_), CellValue::Int64(_))
                | (Self::Float32(_), CellValue::Float32(_))
                | (Self::Float64(_), CellValue::Float64(_))
                | (Self::VarChar(_), CellValue::VarChar(_))
                | (Self::VarBinary(_), CellValue::VarBinary(_))
        )
    }

    /// Push a pre-validated cell (see [`accepts`](Self::accepts)).
    fn push(&mut self, cell: &CellValue) {
        match (self, cell) {
            (Self::Int8(col), CellValue::Int8(v)) => col.push(*v),
            (Self::Int16(col), CellValue::Int16(v)) => col.push(*v),
            (Self::Int32(col), CellValue::Int32(v)) => col.push(*v),
            (Self::Int64(col), CellValue::Int64(v)) => col.push(*v),
            (Self::Float32(col), CellValue::Float32(v)) => col.push(*v),
            (Self::Float64(col), CellValue::Float64(v)) => col.push(*v),
            (Self::VarChar(col), CellValue::VarChar(v)) => col.push(v.clone()),
            (Self::VarBinary(col), CellValue::VarBinary(v)) => col.push(v.clone()),
            _ => unreachable!("cell validated by accepts()"),
        }
    }

    /// One batched write of the staged values.
    fn write_into(&self, writer: &mut AnyColumnWriter) -> Result<()> {
        match (self, writer) {
            (Self::Int8(col), AnyColumnWriter::Int8(w)) => w.write_values(col),
            (Self::Int16(col), AnyColumnWriter::Int16(w)) => w.write_values(col),
            (Self::Int32(col), AnyColumnWriter::Int32(w)) => w.write_values(col),
            (Self::Int64(col), AnyColumnWriter::Int64(w)) => w.write_values(col),
            (Self::Float32(col), AnyColumnWriter::Float32(w)) => w.write_values(col),
            (Self::Float64(col), AnyColumnWriter::Float64(w)) => w.write_values(col),
            (Self::VarChar(col), AnyColumnWriter::VarChar(w)) => w.write_values(col),
            (Self::VarBinary(col), AnyColumnWriter::VarBinary(w)) => w.write_values(col),
            _ => Err(Error::usage(
                "column writer kind does not match buffered column",
            )),
        }
    }

    fn clear(&mut self) {
        match self {
            Self::Int8(col) => col.clear(),
            Self::Int16(col) => col.clear(),
            Self::Int32(col) => col.clear(),
            Self::Int64(col) => col.clear(),
            Self::Float32(col) => col.clear(),
            Self::Float64(col) => col.clear(),
            Self::VarChar(col) => col.clear(),
            Self::VarBinary(col) => col.clear(),
        }
    }
}

/// Fixed-capacity multi-column staging buffer.
pub struct TupleBuffer {
    columns: Vec<ColumnData>,
    capacity: usize,
    rows: usize,
}

impl TupleBuffer {
    /// A buffer for the given column types holding up to `capacity` rows.
    pub fn new(column_types: &[ColumnType], capacity: usize) -> Self {
        Self {
            columns: column_types
                .iter()
                .map(|&ct| ColumnData::for_type(ct, capacity))
                .collect(),
            capacity: capacity.max(1),
            rows: 0,
        }
    }

    /// Stage one row. Arity or cell-type mismatches reject the whole row;
    /// a full buffer must be drained first.
    pub fn append_row(&mut self, row: &[CellValue]) -> Result<()> {
        if self.rows == self.capacity {
            return Err(Error::usage("tuple buffer full; drain before appending"));
        }
        if row.len() != self.columns.len() {
            return Err(Error::usage(format!(
                "row has {} cells, buffer has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        for (i, (column, cell)) in self.columns.iter().zip(row).enumerate() {
            if !column.accepts(cell) {
                return Err(Error::usage(format!(
                    "cell type mismatch in column {}",
                    i
                )));
            }
        }
        for (column, cell) in self.columns.iter_mut().zip(row) {
            column.push(cell);
        }
        self.rows += 1;
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.rows == self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Rows currently staged.
    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Drain the staged rows: one batched write per column, then reset.
    pub fn drain_into(&mut self, writers: &mut [AnyColumnWriter]) -> Result<()> {
        if writers.len() != self.columns.len() {
            return Err(Error::usage(format!(
                "{} writers for {} buffered columns",
                writers.len(),
                self.columns.len()
            )));
        }
        for (column, writer) in self.columns.iter().zip(writers.iter_mut()) {
            column.write_into(writer)?;
        }
        self.clear();
        Ok(())
    }

    /// Discard staged rows without writing.
    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
        self.rows = 0;
    }
}
