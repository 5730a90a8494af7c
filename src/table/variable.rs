//! Variable: a named column together with its metadata

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::compute::kernels::numeric;
use arrow::datatypes::DataType;

use super::error::{TableError, TableResult};
use super::kernels::cast_to;
use crate::meta::{
    ConflictPolicy, LogEntry, Operation, ProcessingLevel, VariableMeta,
    combine_variables_metadata,
};

/// A single column and the metadata describing it
///
/// Arithmetic between variables casts both operands to Float64 and derives
/// the result's metadata with
/// [`combine_variables_metadata`](crate::meta::combine_variables_metadata).
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use arrow::array::Float64Array;
/// use owid_catalog::meta::{Origin, ProcessingLevel, VariableMeta};
/// use owid_catalog::table::Variable;
///
/// let gdp = Variable::new(
///     "gdp",
///     Arc::new(Float64Array::from(vec![100.0, 200.0])),
///     VariableMeta::new().with_origin(Origin::new("World Bank")),
/// );
/// let pop = Variable::new(
///     "population",
///     Arc::new(Float64Array::from(vec![10.0, 20.0])),
///     VariableMeta::new().with_origin(Origin::new("UN")),
/// );
///
/// let gdp_pc = gdp.div(&pop, "gdp_per_capita").unwrap();
/// assert_eq!(gdp_pc.metadata.origins.len(), 2);
/// assert_eq!(gdp_pc.metadata.processing_level, Some(ProcessingLevel::Major));
/// ```
#[derive(Debug, Clone)]
pub struct Variable {
    name: String,
    values: ArrayRef,
    pub metadata: VariableMeta,
}

impl Variable {
    pub fn new(name: impl Into<String>, values: ArrayRef, metadata: VariableMeta) -> Self {
        Self {
            name: name.into(),
            values,
            metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &ArrayRef {
        &self.values
    }

    pub fn data_type(&self) -> &DataType {
        self.values.data_type()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn into_parts(self) -> (String, ArrayRef, VariableMeta) {
        (self.name, self.values, self.metadata)
    }

    pub fn with_metadata(mut self, metadata: VariableMeta) -> Self {
        self.metadata = metadata;
        self
    }

    /// Same values under a new name; the rename is logged
    pub fn rename(&self, new_name: impl Into<String>) -> Variable {
        let new_name = new_name.into();
        let mut metadata = self.metadata.clone();
        if new_name != self.name {
            metadata.log(LogEntry::new(&new_name, vec![self.name.clone()], "rename"));
        }
        Variable::new(new_name, self.values.clone(), metadata)
    }

    /// Replace the values, keeping name and metadata
    pub fn with_values(&self, values: ArrayRef) -> TableResult<Variable> {
        if values.len() != self.len() {
            return Err(TableError::LengthMismatch {
                column: self.name.clone(),
                expected: self.len(),
                found: values.len(),
            });
        }
        Ok(Variable::new(&self.name, values, self.metadata.clone()))
    }

    pub fn add(&self, other: &Variable, name: &str) -> TableResult<Variable> {
        self.binary(other, Operation::Add, name)
    }

    pub fn sub(&self, other: &Variable, name: &str) -> TableResult<Variable> {
        self.binary(other, Operation::Subtract, name)
    }

    pub fn mul(&self, other: &Variable, name: &str) -> TableResult<Variable> {
        self.binary(other, Operation::Multiply, name)
    }

    pub fn div(&self, other: &Variable, name: &str) -> TableResult<Variable> {
        self.binary(other, Operation::Divide, name)
    }

    /// Add a constant (e.g., an offset); unit is kept, level at least minor
    pub fn add_scalar(&self, value: f64, name: &str) -> TableResult<Variable> {
        let lhs = cast_to(&self.values, &DataType::Float64)?;
        let values = numeric::add(&lhs, &Float64Array::new_scalar(value))?;

        let mut metadata = self.metadata.clone();
        metadata.escalate(ProcessingLevel::Minor);
        metadata.log(
            LogEntry::new(name, vec![self.name.clone()], Operation::Add.name())
                .with_comment(format!("scalar {value}")),
        );
        Ok(Variable::new(name, values, metadata))
    }

    /// Multiply by a constant (e.g., a unit conversion); unit is cleared
    pub fn mul_scalar(&self, value: f64, name: &str) -> TableResult<Variable> {
        let lhs = cast_to(&self.values, &DataType::Float64)?;
        let values = numeric::mul(&lhs, &Float64Array::new_scalar(value))?;

        let mut metadata = self.metadata.clone();
        metadata.unit = None;
        metadata.short_unit = None;
        metadata.escalate(ProcessingLevel::Minor);
        metadata.log(
            LogEntry::new(name, vec![self.name.clone()], Operation::Multiply.name())
                .with_comment(format!("scalar {value}")),
        );
        Ok(Variable::new(name, values, metadata))
    }

    fn binary(&self, other: &Variable, operation: Operation, name: &str) -> TableResult<Variable> {
        if self.len() != other.len() {
            return Err(TableError::LengthMismatch {
                column: other.name.clone(),
                expected: self.len(),
                found: other.len(),
            });
        }

        let lhs = cast_to(&self.values, &DataType::Float64)?;
        let rhs = cast_to(&other.values, &DataType::Float64)?;
        let values = match operation {
            Operation::Add => numeric::add(&lhs, &rhs)?,
            Operation::Subtract => numeric::sub(&lhs, &rhs)?,
            Operation::Multiply => numeric::mul(&lhs, &rhs)?,
            Operation::Divide => numeric::div(&lhs, &rhs)?,
            other => {
                return Err(TableError::InvalidArgument(format!(
                    "{} is not an arithmetic operation",
                    other.name()
                )));
            }
        };

        let metadata = combine_variables_metadata(
            &[(self.name.as_str(), &self.metadata), (other.name.as_str(), &other.metadata)],
            operation,
            name,
            ConflictPolicy::Warn,
        )
        .metadata;

        Ok(Variable::new(name, values, metadata))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{AsArray, Int64Array};
    use arrow::datatypes::Float64Type;

    use super::*;
    use crate::meta::Origin;

    fn variable(name: &str, values: Vec<i64>, producer: &str) -> Variable {
        Variable::new(
            name,
            Arc::new(Int64Array::from(values)),
            VariableMeta::new()
                .with_title(name)
                .with_unit("people", None)
                .with_origin(Origin::new(producer)),
        )
    }

    #[test]
    fn test_add_keeps_shared_unit() {
        let men = variable("men", vec![1, 2], "UN");
        let women = variable("women", vec![3, 4], "UN");

        let total = men.add(&women, "population").unwrap();
        let values = total.values().as_primitive::<Float64Type>();
        assert_eq!(values.values().to_vec(), vec![4.0, 6.0]);
        assert_eq!(total.metadata.unit.as_deref(), Some("people"));
        assert_eq!(total.metadata.title, None);
        assert_eq!(total.metadata.origins, vec![Origin::new("UN")]);
        assert_eq!(total.metadata.processing_level, Some(ProcessingLevel::Major));
    }

    #[test]
    fn test_rename_is_logged() {
        let pop = variable("pop", vec![1], "UN");
        let renamed = pop.rename("population");
        assert_eq!(renamed.name(), "population");
        assert_eq!(renamed.metadata.origins, pop.metadata.origins);
        assert_eq!(renamed.metadata.processing_log.roots("population"), vec!["pop"]);
    }

    #[test]
    fn test_mul_scalar_clears_unit() {
        let share = variable("share", vec![1, 2], "UN");
        let pct = share.mul_scalar(100.0, "share_pct").unwrap();
        assert_eq!(pct.metadata.unit, None);
        assert_eq!(pct.metadata.processing_level, Some(ProcessingLevel::Minor));
        assert_eq!(pct.metadata.processing_log.roots("share_pct"), vec!["share"]);
    }

    #[test]
    fn test_length_mismatch() {
        let a = variable("a", vec![1, 2], "UN");
        let b = variable("b", vec![1], "UN");
        assert!(matches!(a.sub(&b, "c"), Err(TableError::LengthMismatch { .. })));
    }
}
