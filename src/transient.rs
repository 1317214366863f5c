//! One list container per stress period.
//!
//! Periods are keyed by their zero based index. A key missing from the map
//! means the period has no data at all, which is not the same as a period
//! holding an empty row sequence.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::array::{stack_periods, ColumnArrays};
use crate::context::ModelContext;
use crate::datatype::{Row, Value};
use crate::error::Result;
use crate::list::{DataList, ListInput};
use crate::reader::{BlockHeader, LoadResult};
use crate::storage::{Comment, ListData};
use crate::structure::DatasetStructure;

#[derive(Debug, Clone)]
pub struct TransientDataList {
    structure: Arc<DatasetStructure>,
    context: Arc<ModelContext>,
    periods: IndexMap<usize, DataList>,
}

impl TransientDataList {
    pub fn new(structure: Arc<DatasetStructure>, context: Arc<ModelContext>) -> Self {
        Self {
            structure,
            context,
            periods: IndexMap::new(),
        }
    }
    pub fn structure(&self) -> &DatasetStructure {
        &self.structure
    }
    /// Keys of the periods that are present, in insertion order.
    pub fn periods(&self) -> impl Iterator<Item = usize> + '_ {
        self.periods.keys().copied()
    }
    pub fn period(&self, key: usize) -> Option<&DataList> {
        self.periods.get(&key)
    }
    pub fn period_mut(&mut self, key: usize) -> Option<&mut DataList> {
        self.periods.get_mut(&key)
    }

    fn new_period(&self, key: usize) -> DataList {
        DataList::new(Arc::clone(&self.structure), Arc::clone(&self.context)).with_period(key)
    }

    /// Makes the period present with empty inline data; an existing period is left alone.
    pub fn add_period(&mut self, key: usize) -> &mut DataList {
        if !self.periods.contains_key(&key) {
            let period = self.new_period(key);
            self.periods.insert(key, period);
        }
        &mut self.periods[&key]
    }

    pub fn remove_period(&mut self, key: usize) -> Option<DataList> {
        self.periods.shift_remove(&key)
    }

    pub fn new_simulation(&mut self) {
        self.periods.clear();
    }

    /// `None` removes a period, anything else replaces its data.
    pub fn set_data<I>(&mut self, data: I, autofill: bool) -> Result<()>
    where
        I: IntoIterator<Item = (usize, Option<ListInput>)>,
    {
        for (key, input) in data {
            self.set_period_data(key, input, autofill)?;
        }
        Ok(())
    }

    pub fn set_period_data(&mut self, key: usize, input: Option<ListInput>, autofill: bool) -> Result<()> {
        let Some(input) = input else {
            if self.remove_period(key).is_some() {
                debug!(period = key, "period removed");
            }
            return Ok(());
        };
        match self.periods.get_mut(&key) {
            Some(period) => period.set_data(input, autofill, true),
            None => {
                // a period only appears once its data passed the checks
                let mut period = self.new_period(key);
                period.set_data(input, autofill, true)?;
                self.periods.insert(key, period);
                Ok(())
            }
        }
    }

    /// Sets data without an explicit key. The period is the integer in the first
    /// non-keyword column of the first row, or 0 when there is none.
    pub fn set_data_unkeyed(&mut self, input: ListInput, autofill: bool) -> Result<()> {
        let first_row = match &input {
            ListInput::Rows(rows) => rows.first(),
            ListInput::Row(row) => Some(row),
            _ => None,
        };
        let key = self
            .structure
            .first_non_keyword_index()
            .and_then(|position| first_row?.get(position))
            .and_then(|value| match value {
                Value::Integer(n) => usize::try_from(*n).ok(),
                _ => None,
            })
            .unwrap_or(0);
        debug!(period = key, "period taken from the data");
        self.set_period_data(key, Some(input), autofill)
    }

    pub fn get_data(&self, key: usize) -> Option<ListData<'_>> {
        self.periods.get(&key)?.get_data()
    }

    /// Data of every present period.
    pub fn get_all_data(&self) -> IndexMap<usize, ListData<'_>> {
        self.periods
            .iter()
            .filter_map(|(key, period)| period.get_data().map(|data| (*key, data)))
            .collect()
    }

    /// One slot per declared stress period, `None` where a period has no data.
    pub fn get_data_array(&self) -> Vec<Option<ListData<'_>>> {
        (0..self.context.stress_periods()).map(|key| self.get_data(key)).collect()
    }

    /// With a key, whether that period has data; without, whether any period has.
    pub fn has_data(&self, key: Option<usize>) -> bool {
        match key {
            Some(key) => self.periods.get(&key).is_some_and(DataList::has_data),
            None => self.periods.values().any(DataList::has_data),
        }
    }

    pub fn get_file_entry(&self, key: usize) -> Result<String> {
        match self.periods.get(&key) {
            Some(period) => period.get_file_entry(false),
            None => Ok(String::new()),
        }
    }

    /// Loads the block of the period named in `header` (one based), replacing that period.
    pub fn load(
        &mut self,
        first_line: &str,
        lines: &mut dyn Iterator<Item = String>,
        header: &BlockHeader,
        pre_comments: Option<Comment>,
    ) -> Result<LoadResult> {
        let key = header.period().unwrap_or(1).saturating_sub(1);
        let mut period = self.new_period(key);
        let result = period.load(first_line, lines, Some(header), pre_comments)?;
        self.periods.insert(key, period);
        Ok(result)
    }

    pub fn append_list_as_record(&mut self, values: Row, key: usize) -> Result<()> {
        self.add_period(key).append_list_as_record(values)
    }

    pub fn update_record(&mut self, values: Row, index: usize, key: usize) -> Result<()> {
        self.add_period(key).update_record(values, index)
    }

    /// Moves the inline data or constant of every period into its own file, named after
    /// `path` with the one based period number before the extension.
    pub fn store_as_external_file(&mut self, path: impl AsRef<Path>, binary: bool, replace_existing: bool, check: bool) -> Result<()> {
        let path = path.as_ref();
        for key in 0..self.context.stress_periods() {
            let Some(period) = self.periods.get_mut(&key) else {
                continue;
            };
            let held = period
                .storage()
                .is_some_and(|s| s.has_data() && !s.backing().is_external());
            if held {
                period.store_as_external_file(period_file_name(path, key), binary, replace_existing, check)?;
            }
        }
        Ok(())
    }

    pub fn to_array(&self, kper: usize, mask: bool) -> Result<Option<ColumnArrays>> {
        match self.periods.get(&kper) {
            Some(period) => period.to_array(mask),
            None => Ok(None),
        }
    }

    /// Masked arrays of every declared period stacked along a leading period axis.
    pub fn masked_4d_arrays(&self) -> Result<Option<ColumnArrays>> {
        let Some(grid) = self.context.grid() else {
            return Ok(None);
        };
        let mut periods = Vec::with_capacity(self.context.stress_periods());
        for kper in 0..self.context.stress_periods() {
            periods.push(self.to_array(kper, true)?);
        }
        if periods.iter().all(Option::is_none) {
            return Ok(None);
        }
        let columns = self.structure.columns(self.context.package());
        Ok(Some(stack_periods(&periods, &columns, &grid.axis_bounds())))
    }
}

/// `wel.txt` for period 0 becomes `wel_1.txt`.
pub fn period_file_name(path: &Path, key: usize) -> PathBuf {
    let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let name = match path.extension() {
        Some(extension) => format!("{}_{}.{}", stem, key + 1, extension.to_string_lossy()),
        None => format!("{}_{}", stem, key + 1),
    };
    path.with_file_name(name)
}
