use anyhow::Result;
use arrow::{
    array::{Array, AsArray},
    compute::cast,
    datatypes::{DataType, Float64Type},
    util::display::{ArrayFormatter, FormatOptions},
};

/// Render every cell of `array` as text, keeping nulls as `None`.
pub fn string_values(array: &dyn Array) -> Result<Vec<Option<String>>> {
    if let Some(sarr) = array.as_string_opt::<i32>() {
        return Ok(sarr.iter().map(|v| v.map(str::to_string)).collect());
    }
    if array.data_type() == &DataType::Null {
        return Ok(vec![None; array.len()]);
    }
    let nulls = array.logical_nulls();
    let formatter = ArrayFormatter::try_new(array, &FormatOptions::default())?;
    Ok((0..array.len())
        .map(|i| {
            if nulls.as_ref().is_some_and(|n| n.is_null(i)) {
                None
            } else {
                Some(formatter.value(i).to_string())
            }
        })
        .collect())
}

/// Numeric view of a column; cells that do not cast become `None`.
pub fn float_values(array: &dyn Array) -> Result<Vec<Option<f64>>> {
    let casted = cast(array, &DataType::Float64)?;
    Ok(casted.as_primitive::<Float64Type>().iter().collect())
}

/// Number of non-null cells, counting every cell of a `Null`-typed array as null.
pub fn non_null_count(array: &dyn Array) -> usize {
    array.len() - array.logical_nulls().map(|n| n.null_count()).unwrap_or(0)
}

/// Count of distinct non-null values.
pub fn distinct_non_null(values: &[Option<String>]) -> usize {
    values
        .iter()
        .flatten()
        .collect::<std::collections::HashSet<_>>()
        .len()
}
