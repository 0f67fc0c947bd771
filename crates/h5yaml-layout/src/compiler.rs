//! Layout compiler.
//!
//! Turns a [`SchemaDefinition`] into a deterministic sequence of creation
//! calls on a [`StorageEngine`]. The phases run in a fixed order because each
//! one references what the previous ones created:
//!
//! 1. groups (with every intermediate group),
//! 2. dimensions, each optionally backed by a coordinate variable,
//! 3. compound types,
//! 4. variables,
//! 5. global and path-qualified attributes.
//!
//! Validation failures stop compilation immediately; there is no partial
//! success mode. Everything created is recorded in caller-visible
//! [`Registries`].

use log::{debug, warn};

use crate::chunks::ChunkAdvice;
use crate::coerce::coerce_with;
use crate::config::LayoutConfig;
use crate::dtype::{Dtype, VLEN_DESCRIPTOR_SIZE};
use crate::engine::{CompoundField, ElementType, NodeId, StorageEngine, VariableProps};
use crate::error::{Error, ValidationError};
use crate::path;
use crate::registry::{CompoundEntry, DimensionEntry, Registries, VariableEntry};
use crate::schema::{
    Attributes, ChunkSpec, CompoundSpec, DimensionControl, DimensionSpec, Dims, FillSpec,
    SchemaDefinition, VariableSpec,
};
use crate::value::{ArrayData, AttrValue, Number, NumericArray};

/// Dimension-scale name of a coordinate variable without a `long_name`.
pub const NETCDF_DIMENSION_MARKER: &str = "This is a netCDF dimension but not a netCDF variable.";

/// Compile `def` into `engine` with fresh registries.
pub fn compile<E: StorageEngine + ?Sized>(
    def: &SchemaDefinition,
    engine: &mut E,
    config: &LayoutConfig,
) -> Result<Registries, Error> {
    let mut registries = Registries::new();
    compile_with(def, engine, config, &mut registries)?;
    Ok(registries)
}

/// Compile `def` into `engine`, recording into existing `registries`.
pub fn compile_with<E: StorageEngine + ?Sized>(
    def: &SchemaDefinition,
    engine: &mut E,
    config: &LayoutConfig,
    registries: &mut Registries,
) -> Result<(), Error> {
    let mut compiler = Compiler {
        engine,
        config,
        reg: registries,
    };
    compiler.groups(def)?;
    compiler.dimensions(def)?;
    compiler.compounds(def)?;
    compiler.variables(def)?;
    compiler.attributes(def)?;
    Ok(())
}

struct Compiler<'a, E: StorageEngine + ?Sized> {
    engine: &'a mut E,
    config: &'a LayoutConfig,
    reg: &'a mut Registries,
}

impl<E: StorageEngine + ?Sized> Compiler<'_, E> {
    fn groups(&mut self, def: &SchemaDefinition) -> Result<(), Error> {
        debug!("creating {} groups", def.groups.len());
        for group in &def.groups {
            self.ensure_group(&path::normalize(group))?;
        }
        Ok(())
    }

    fn dimensions(&mut self, def: &SchemaDefinition) -> Result<(), Error> {
        debug!("creating {} dimensions", def.dimensions.len());
        for (key, spec) in &def.dimensions {
            let node = node_path(key)?;
            self.dimension(&node, spec)?;
        }
        Ok(())
    }

    fn dimension(&mut self, node: &str, spec: &DimensionSpec) -> Result<(), Error> {
        let control = &spec.control;
        let size = control.size;
        self.ensure_group(path::parent(node).unwrap_or(""))?;

        let Some(code) = &control.dtype else {
            let dim = self.engine.create_dimension(node, size)?;
            if !spec.attributes.is_empty() {
                warn!("{node}: dimension has no coordinate variable, attributes dropped");
            }
            debug!("dimension {node} (size {size})");
            self.reg
                .dimensions
                .insert(node, DimensionEntry { id: dim, size });
            return Ok(());
        };

        let dtype = Dtype::parse(code).ok_or_else(|| ValidationError::UnknownDtype {
            node: node.to_string(),
            code: code.clone(),
        })?;
        let mut props = VariableProps::new(ElementType::Primitive(dtype), &[size]);
        match &control.chunks {
            Some(ChunkSpec::Contiguous) if size == 0 => {
                return Err(ValidationError::ContiguousUnlimited {
                    variable: node.to_string(),
                }
                .into());
            }
            Some(ChunkSpec::Contiguous) => {}
            Some(ChunkSpec::Shape(dims)) => {
                check_chunks(node, dims, &[size])?;
                props = props.chunk(dims);
            }
            None if size == 0 => {
                props = props.chunk(&[self.config.chunks.dimension_unlimited_chunk]);
            }
            None => {}
        }
        if size == 0 {
            props = props.maxshape(&[None]);
        } else if props.is_chunked() {
            props = props.maxshape(&[Some(size)]);
        }
        if let Some(fill) = fill_value(node, dtype, control.fill_value)? {
            props = props.fill_value(fill);
        }

        let data = if size > 0 {
            coordinate_data(node, dtype, control)?
        } else {
            if control.values.is_some() || control.range.is_some() {
                warn!("{node}: unlimited dimension, _values/_range ignored");
            }
            None
        };

        let var = self.engine.create_variable(node, &props)?;
        if let Some(data) = data {
            self.engine.write_data(var, &data)?;
        }
        let dim = self.engine.create_dimension(node, size)?;
        let scale_name = if spec.attributes.contains_key("long_name") {
            path::leaf(node)
        } else {
            NETCDF_DIMENSION_MARKER
        };
        self.engine.make_scale(var, dim, scale_name)?;
        self.apply_attributes(var, node, Some(dtype), &spec.attributes)?;
        debug!("dimension {node} (size {size}) with coordinate variable of type {dtype}");

        self.reg
            .dimensions
            .insert(node, DimensionEntry { id: dim, size });
        self.reg.variables.insert(
            node,
            VariableEntry {
                id: var,
                dtype: Some(dtype),
            },
        );
        Ok(())
    }

    fn compounds(&mut self, def: &SchemaDefinition) -> Result<(), Error> {
        debug!("registering {} compound types", def.compounds.len());
        for (name, spec) in &def.compounds {
            self.compound(name, spec)?;
        }
        Ok(())
    }

    fn compound(&mut self, name: &str, spec: &CompoundSpec) -> Result<(), Error> {
        if spec.fields.is_empty() {
            return Err(ValidationError::InvalidSpec {
                node: name.to_string(),
                reason: "compound type without fields".to_string(),
            }
            .into());
        }
        let mut members = Vec::with_capacity(spec.fields.len());
        for field in &spec.fields {
            let dtype = Dtype::parse(&field.dtype).ok_or_else(|| ValidationError::UnknownDtype {
                node: format!("{name}.{}", field.name),
                code: field.dtype.clone(),
            })?;
            members.push((field.name.clone(), dtype));
        }
        let fields = CompoundField::pack(&members);
        let size: usize = members.iter().map(|(_, dt)| dt.size()).sum();
        let id = self.engine.create_compound_type(name, &fields)?;
        debug!("compound type {name} ({} fields, {size} bytes)", fields.len());

        let entry = CompoundEntry {
            element: ElementType::Compound {
                id,
                name: name.to_string(),
                size,
            },
            units: spec.fields.iter().filter_map(|f| f.units.clone()).collect(),
            long_names: spec
                .fields
                .iter()
                .filter_map(|f| f.long_name.clone())
                .collect(),
        };
        self.reg.types.insert_compound(name, entry);
        Ok(())
    }

    fn variables(&mut self, def: &SchemaDefinition) -> Result<(), Error> {
        debug!("creating {} variables", def.variables.len());
        for (key, spec) in &def.variables {
            let node = node_path(key)?;
            self.variable(&node, spec)?;
        }
        Ok(())
    }

    fn variable(&mut self, node: &str, spec: &VariableSpec) -> Result<(), Error> {
        let control = &spec.control;
        let code = control.dtype.as_str();
        let (element, dtype) = self.resolve_dtype(node, code)?;

        let fill = match dtype {
            Some(_) if control.vlen => {
                if control.fill_value.is_some() {
                    debug!("{node}: variable-length type, _FillValue dropped");
                }
                None
            }
            Some(dt) => fill_value(node, dt, control.fill_value)?,
            None => {
                if control.fill_value.is_some() {
                    warn!("{node}: _FillValue ignored for compound type {code}");
                }
                None
            }
        };

        let axes = match &control.dims {
            Dims::Scalar => {
                self.ensure_group(path::parent(node).unwrap_or(""))?;
                let mut props = VariableProps::scalar(element);
                if let Some(fill) = fill {
                    props = props.fill_value(fill);
                }
                let var = self.engine.create_variable(node, &props)?;
                self.apply_attributes(var, node, dtype, &spec.attributes)?;
                debug!("scalar variable {node} of type {code}");
                self.reg
                    .variables
                    .insert(node, VariableEntry { id: var, dtype });
                return Ok(());
            }
            Dims::Axes(axes) => axes,
        };

        let scope = path::parent(node).unwrap_or("");
        let mut resolved = Vec::with_capacity(axes.len());
        for reference in axes {
            let (dim_path, entry) =
                self.reg
                    .dimensions
                    .resolve(scope, reference)
                    .ok_or_else(|| ValidationError::UnknownDimension {
                        variable: node.to_string(),
                        dimension: reference.clone(),
                    })?;
            resolved.push((dim_path.to_string(), *entry));
        }

        let shape: Vec<u64> = resolved.iter().map(|(_, e)| e.size).collect();
        let maxshape: Vec<Option<u64>> = shape
            .iter()
            .map(|&n| if n == 0 { None } else { Some(n) })
            .collect();
        let unlimited: Vec<String> = resolved
            .iter()
            .filter(|(_, e)| e.size == 0)
            .map(|(p, _)| p.clone())
            .collect();
        if unlimited.len() > 1 {
            return Err(ValidationError::MultipleUnlimited {
                variable: node.to_string(),
                dimensions: unlimited,
            }
            .into());
        }
        let udim = shape.iter().position(|&n| n == 0);

        if control.vlen && matches!(element, ElementType::Compound { .. }) {
            return Err(ValidationError::VlenCompound {
                variable: node.to_string(),
                compound: code.to_string(),
            }
            .into());
        }

        let chunks = match &control.chunks {
            Some(ChunkSpec::Contiguous) => {
                if udim.is_some() {
                    return Err(ValidationError::ContiguousUnlimited {
                        variable: node.to_string(),
                    }
                    .into());
                }
                None
            }
            Some(ChunkSpec::Shape(dims)) => {
                check_chunks(node, dims, &shape)?;
                Some(dims.clone())
            }
            None => {
                let size = if control.vlen {
                    VLEN_DESCRIPTOR_SIZE
                } else {
                    element.size()
                };
                match self.config.chunks.advise(&shape, size) {
                    ChunkAdvice::Contiguous => None,
                    ChunkAdvice::Chunked(mut dims) => {
                        if let (true, Some(axis)) = (control.vlen, udim) {
                            dims[axis] = self.config.chunks.vlen_unlimited_chunk;
                        }
                        Some(dims)
                    }
                }
            }
        };

        let compression = match control.compression {
            Some(level) if level > 9 => {
                return Err(ValidationError::InvalidSpec {
                    node: node.to_string(),
                    reason: format!("_compression level {level} is outside 0..=9"),
                }
                .into());
            }
            Some(_) if chunks.is_none() => {
                warn!("{node}: contiguous storage, _compression dropped");
                None
            }
            level => level,
        };

        // Validation is complete; engine writes for this variable start here.
        self.ensure_group(scope)?;

        let element = if control.vlen {
            self.vlen_type(code, element)?
        } else {
            element
        };

        let mut props = VariableProps::new(element, &shape);
        if let Some(dims) = &chunks {
            props = props.chunk(dims).maxshape(&maxshape);
        }
        if let Some(level) = compression {
            props = props.deflate(level).shuffle();
        }
        if let Some(fill) = fill {
            props = props.fill_value(fill);
        }

        let var = self.engine.create_variable(node, &props)?;
        for (axis, (_, entry)) in resolved.iter().enumerate() {
            self.engine.attach_scale(var, axis, entry.id)?;
        }
        self.apply_attributes(var, node, dtype, &spec.attributes)?;

        if let Some(entry) = self.reg.types.compound(code) {
            let units = entry.units.clone();
            let long_names = entry.long_names.clone();
            if !units.is_empty() {
                self.engine
                    .set_attribute(var, "units", &AttrValue::StringArray(units))?;
            }
            if !long_names.is_empty() {
                self.engine
                    .set_attribute(var, "long_name", &AttrValue::StringArray(long_names))?;
            }
        }
        debug!(
            "variable {node} of type {code}, shape {shape:?}, chunks {:?}",
            props.chunk_dims
        );

        self.reg
            .variables
            .insert(node, VariableEntry { id: var, dtype });
        Ok(())
    }

    fn attributes(&mut self, def: &SchemaDefinition) -> Result<(), Error> {
        debug!(
            "writing {} global and {} group attributes",
            def.attrs_global.len(),
            def.attrs_group.len()
        );
        let root = self.engine.root();
        for (name, value) in &def.attrs_global {
            self.write_if_absent(root, "", None, name, value)?;
        }
        for (key, value) in &def.attrs_group {
            let (owner, name) = path::split_attr_key(key);
            let node = self
                .engine
                .lookup(&owner)
                .ok_or_else(|| ValidationError::UnknownNode { key: key.clone() })?;
            let dtype = self.reg.variables.get(&owner).and_then(|e| e.dtype);
            self.write_if_absent(node, &owner, dtype, name, value)?;
        }
        Ok(())
    }

    fn write_if_absent(
        &mut self,
        node: NodeId,
        owner: &str,
        dtype: Option<Dtype>,
        name: &str,
        value: &AttrValue,
    ) -> Result<(), Error> {
        if value.is_placeholder(&self.config.placeholder) {
            debug!("/{owner}: placeholder attribute {name} skipped");
            return Ok(());
        }
        if self.engine.has_attribute(node, name) {
            debug!("/{owner}: attribute {name} already present, kept");
            return Ok(());
        }
        let value = self.coerce(owner, dtype, name, value)?;
        self.engine.set_attribute(node, name, &value)?;
        Ok(())
    }

    fn apply_attributes(
        &mut self,
        node: NodeId,
        owner: &str,
        dtype: Option<Dtype>,
        attrs: &Attributes,
    ) -> Result<(), Error> {
        for (name, value) in attrs {
            let value = self.coerce(owner, dtype, name, value)?;
            self.engine.set_attribute(node, name, &value)?;
        }
        Ok(())
    }

    fn coerce(
        &self,
        owner: &str,
        dtype: Option<Dtype>,
        name: &str,
        value: &AttrValue,
    ) -> Result<AttrValue, ValidationError> {
        let Some(dtype) = dtype else {
            return Ok(value.clone());
        };
        coerce_with(
            &dtype.to_string(),
            name,
            value.clone(),
            self.config.flag_width,
        )
        .map_err(|e| ValidationError::AttributeRange {
            node: owner.to_string(),
            attribute: name.to_string(),
            reason: e.to_string(),
        })
    }

    fn resolve_dtype(
        &self,
        node: &str,
        code: &str,
    ) -> Result<(ElementType, Option<Dtype>), ValidationError> {
        if let Some(entry) = self.reg.types.compound(code) {
            return Ok((entry.element.clone(), None));
        }
        match Dtype::parse(code) {
            Some(dt) => Ok((ElementType::Primitive(dt), Some(dt))),
            None => Err(ValidationError::UnknownDtype {
                node: node.to_string(),
                code: code.to_string(),
            }),
        }
    }

    /// The variable-length type for `code`, registered on first use.
    fn vlen_type(&mut self, code: &str, base: ElementType) -> Result<ElementType, Error> {
        let name = vlen_type_name(code);
        if let Some(element) = self.reg.types.vlen(&name) {
            return Ok(element.clone());
        }
        let id = self.engine.create_vlen_type(&name, &base)?;
        debug!("variable-length type {name}");
        let element = ElementType::Vlen {
            id,
            name: name.clone(),
            base: Box::new(base),
        };
        self.reg.types.insert_vlen(name, element.clone());
        Ok(element)
    }

    fn ensure_group(&mut self, group: &str) -> Result<NodeId, Error> {
        if group.is_empty() {
            return Ok(self.engine.root());
        }
        for ancestor in path::ancestors(group) {
            self.engine.create_group(ancestor)?;
        }
        Ok(self.engine.create_group(group)?)
    }
}

/// Name of the variable-length type registered for element code `code`:
/// the part before the first `_`, suffixed with `_vlen`.
fn vlen_type_name(code: &str) -> String {
    let base = code.split('_').next().unwrap_or(code);
    format!("{base}_vlen")
}

fn node_path(key: &str) -> Result<String, ValidationError> {
    let node = path::normalize(key);
    if node.is_empty() {
        return Err(ValidationError::InvalidSpec {
            node: key.to_string(),
            reason: "the root group cannot be redefined".to_string(),
        });
    }
    Ok(node)
}

fn check_chunks(node: &str, chunks: &[u64], shape: &[u64]) -> Result<(), ValidationError> {
    if chunks.len() != shape.len() {
        return Err(ValidationError::ChunkRank {
            node: node.to_string(),
            expected: shape.len(),
            found: chunks.len(),
        });
    }
    for (axis, (&chunk, &extent)) in chunks.iter().zip(shape).enumerate() {
        if chunk == 0 {
            return Err(ValidationError::InvalidChunk {
                node: node.to_string(),
                reason: format!("axis {axis} has a zero chunk extent"),
            });
        }
        if extent > 0 && chunk > extent {
            return Err(ValidationError::InvalidChunk {
                node: node.to_string(),
                reason: format!("axis {axis}: chunk {chunk} exceeds extent {extent}"),
            });
        }
    }
    Ok(())
}

fn fill_value(
    node: &str,
    dtype: Dtype,
    fill: Option<FillSpec>,
) -> Result<Option<NumericArray>, ValidationError> {
    let number = match fill {
        None => return Ok(None),
        Some(FillSpec::NaN) if dtype.is_float() => Number::Float(f64::NAN),
        Some(FillSpec::NaN) => {
            return Err(ValidationError::FillValue {
                node: node.to_string(),
                reason: format!("NaN is not representable in {dtype}"),
            })
        }
        Some(FillSpec::Number(n)) => n,
    };
    NumericArray::from_numbers(dtype, &[number])
        .map(Some)
        .map_err(|e| ValidationError::FillValue {
            node: node.to_string(),
            reason: e.to_string(),
        })
}

/// Coordinate data from `_values`, else `_range`. Both must yield exactly
/// `size` elements.
fn coordinate_data(
    node: &str,
    dtype: Dtype,
    control: &DimensionControl,
) -> Result<Option<ArrayData>, ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidSpec {
        node: node.to_string(),
        reason,
    };
    let check_count = |found: u64| {
        if found == control.size {
            Ok(())
        } else {
            Err(ValidationError::ValueCount {
                node: node.to_string(),
                expected: control.size,
                found,
            })
        }
    };

    if let Some(values) = &control.values {
        if control.range.is_some() {
            warn!("{node}: both _values and _range given, _range ignored");
        }
        let data = if dtype.is_string() {
            let strings = match values {
                AttrValue::StringArray(v) => v.clone(),
                AttrValue::String(s) => vec![s.clone()],
                _ => return Err(invalid("_values must be strings".to_string())),
            };
            ArrayData::Strings(strings)
        } else {
            let (numbers, _) = values
                .numbers()
                .ok_or_else(|| invalid("_values must be numeric".to_string()))?;
            let arr = NumericArray::from_numbers(dtype, &numbers)
                .map_err(|e| invalid(format!("_values: {e}")))?;
            ArrayData::Numeric(arr)
        };
        check_count(data.len() as u64)?;
        return Ok(Some(data));
    }

    let Some(range) = &control.range else {
        return Ok(None);
    };
    if dtype.is_string() {
        return Err(invalid("_range requires a numeric _dtype".to_string()));
    }
    check_count(range_len(range).map_err(invalid)?)?;
    let numbers = arange(range).map_err(invalid)?;
    let arr = NumericArray::from_numbers(dtype, &numbers)
        .map_err(|e| invalid(format!("_range: {e}")))?;
    Ok(Some(ArrayData::Numeric(arr)))
}

fn range_bounds(range: &[Number]) -> Result<(Number, Number, Number), String> {
    match *range {
        [stop] => Ok((Number::Int(0), stop, Number::Int(1))),
        [start, stop] => Ok((start, stop, Number::Int(1))),
        [start, stop, step] => Ok((start, stop, step)),
        _ => Err(format!("_range takes 1 to 3 numbers, got {}", range.len())),
    }
}

fn integer_bounds(start: Number, stop: Number, step: Number) -> Option<(i64, i64, i64)> {
    Some((start.as_i64()?, stop.as_i64()?, step.as_i64()?))
}

/// Number of values [`arange`] yields for `range`, without building them.
pub fn range_len(range: &[Number]) -> Result<u64, String> {
    let (start, stop, step) = range_bounds(range)?;
    if let Some((start, stop, step)) = integer_bounds(start, stop, step) {
        if step == 0 {
            return Err("_range step must not be zero".to_string());
        }
        let span = i128::from(stop) - i128::from(start);
        if span == 0 || (span > 0) != (step > 0) {
            return Ok(0);
        }
        let step = i128::from(step);
        let count = (span + step - step.signum()) / step;
        return u64::try_from(count).map_err(|_| "_range yields too many values".to_string());
    }

    let (start, stop, step) = (start.as_f64(), stop.as_f64(), step.as_f64());
    if step == 0.0 || !step.is_finite() || !start.is_finite() || !stop.is_finite() {
        return Err("_range needs finite bounds and a nonzero step".to_string());
    }
    let count = ((stop - start) / step).ceil().max(0.0);
    if !count.is_finite() || count >= u64::MAX as f64 {
        return Err("_range yields too many values".to_string());
    }
    Ok(count as u64)
}

/// Evenly spaced values over `[start, stop)`, from `[stop]`,
/// `[start, stop]` or `[start, stop, step]`.
pub fn arange(range: &[Number]) -> Result<Vec<Number>, String> {
    let count = range_len(range)?;
    let (start, stop, step) = range_bounds(range)?;
    if let Some((start, _, step)) = integer_bounds(start, stop, step) {
        return Ok((0..i128::from(count))
            .map(|i| Number::Int((i128::from(start) + i * i128::from(step)) as i64))
            .collect());
    }
    let (start, step) = (start.as_f64(), step.as_f64());
    Ok((0..count)
        .map(|i| Number::Float(start + i as f64 * step))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryContainer, NamedType};
    use crate::schema::FieldSpec;

    fn run(def: &SchemaDefinition) -> Result<(MemoryContainer, Registries), Error> {
        let mut c = MemoryContainer::new();
        let reg = compile(def, &mut c, &LayoutConfig::default())?;
        Ok((c, reg))
    }

    fn temp_schema() -> SchemaDefinition {
        SchemaDefinition::new()
            .dimension("time", DimensionSpec::new(0))
            .dimension(
                "x",
                DimensionSpec::new(100).dtype("f4").range(vec![
                    Number::Int(0),
                    Number::Int(100),
                    Number::Int(1),
                ]),
            )
            .variable("temp", VariableSpec::new("f4", Dims::axes(&["time", "x"])))
    }

    #[test]
    fn unlimited_time_series() {
        let (c, _) = run(&temp_schema()).unwrap();
        let temp = c.variable("temp").unwrap();
        assert_eq!(temp.props.shape, vec![0, 100]);
        assert_eq!(temp.props.maxshape, Some(vec![None, Some(100)]));
        let chunks = temp.props.chunk_dims.as_ref().unwrap();
        assert_eq!(chunks[1], 100);
        assert_eq!(chunks, &vec![1024, 100]);

        let x = c.variable("x").unwrap();
        let expected: Vec<f32> = (0..100).map(|i| i as f32).collect();
        assert_eq!(
            x.data,
            Some(ArrayData::Numeric(NumericArray::F32(expected)))
        );
        assert!(x.props.chunk_dims.is_none());
        let dims: Vec<_> = temp.dims.iter().map(|d| d.is_some()).collect();
        assert_eq!(dims, vec![true, true]);
    }

    #[test]
    fn multiple_unlimited_dimensions_fail() {
        let def = SchemaDefinition::new()
            .dimension("time", DimensionSpec::new(0))
            .dimension("scan", DimensionSpec::new(0))
            .variable("v", VariableSpec::new("f4", Dims::axes(&["time", "scan"])));
        let mut c = MemoryContainer::new();
        let err = compile(&def, &mut c, &LayoutConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::MultipleUnlimited { .. })
        ));
        assert!(c.node("v").is_none());
    }

    #[test]
    fn contiguous_with_unlimited_fails_before_write() {
        let def = SchemaDefinition::new()
            .dimension("time", DimensionSpec::new(0))
            .variable(
                "grp/v",
                VariableSpec::new("u2", Dims::axes(&["time"])).chunks(ChunkSpec::Contiguous),
            );
        let mut c = MemoryContainer::new();
        let err = compile(&def, &mut c, &LayoutConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::ContiguousUnlimited { .. })
        ));
        assert!(c.node("grp/v").is_none());
        assert!(c.node("grp").is_none());
    }

    #[test]
    fn vlen_on_compound_fails() {
        let def = SchemaDefinition::new()
            .compound("geo_t", CompoundSpec::new().field(FieldSpec::new("lat", "f4")))
            .dimension("n", DimensionSpec::new(10))
            .variable("g", VariableSpec::new("geo_t", Dims::axes(&["n"])).vlen());
        let err = run(&def).unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::VlenCompound { .. })
        ));
    }

    #[test]
    fn unknown_dimension_fails() {
        let def = SchemaDefinition::new()
            .variable("v", VariableSpec::new("f4", Dims::axes(&["missing"])));
        assert!(matches!(
            run(&def).unwrap_err(),
            Error::Validation(ValidationError::UnknownDimension { .. })
        ));
    }

    #[test]
    fn compound_metadata_propagates() {
        let geo = CompoundSpec::new()
            .field(FieldSpec::new("lat", "f4").units("degrees_north").long_name("latitude"))
            .field(FieldSpec::new("lon", "f4").units("degrees_east").long_name("longitude"));
        let def = SchemaDefinition::new()
            .compound("geo_t", geo)
            .dimension("n", DimensionSpec::new(16).dtype("u2"))
            .variable("geo", VariableSpec::new("geo_t", Dims::axes(&["n"])));
        let (c, reg) = run(&def).unwrap();

        assert_eq!(
            c.attribute("geo", "units"),
            Some(&AttrValue::StringArray(vec![
                "degrees_north".into(),
                "degrees_east".into()
            ]))
        );
        assert_eq!(
            c.attribute("geo", "long_name"),
            Some(&AttrValue::StringArray(vec![
                "latitude".into(),
                "longitude".into()
            ]))
        );
        match c.named_type("geo_t").unwrap() {
            NamedType::Compound { fields, size, .. } => {
                assert_eq!(*size, 8);
                assert_eq!(fields[1].offset, 4);
            }
            other => panic!("unexpected type {other:?}"),
        }
        assert_eq!(reg.types.compound("geo_t").unwrap().units.len(), 2);
    }

    #[test]
    fn compound_without_units_keeps_long_names_only() {
        let spec = CompoundSpec::new()
            .field(FieldSpec::new("a", "u1").long_name("first"))
            .field(FieldSpec::new("b", "i4"));
        let def = SchemaDefinition::new()
            .compound("rec_t", spec)
            .variable("rec", VariableSpec::new("rec_t", Dims::Scalar));
        let (c, _) = run(&def).unwrap();
        assert!(c.variable("rec").is_some());

        let def = SchemaDefinition::new()
            .compound(
                "rec_t",
                CompoundSpec::new().field(FieldSpec::new("a", "u1").long_name("first")),
            )
            .dimension("n", DimensionSpec::new(4))
            .variable("rec", VariableSpec::new("rec_t", Dims::axes(&["n"])));
        let (c, _) = run(&def).unwrap();
        assert_eq!(c.attribute("rec", "units"), None);
        assert_eq!(
            c.attribute("rec", "long_name"),
            Some(&AttrValue::StringArray(vec!["first".into()]))
        );
    }

    #[test]
    fn valid_range_is_coerced() {
        let def = SchemaDefinition::new()
            .dimension("n", DimensionSpec::new(8))
            .variable(
                "flags",
                VariableSpec::new("u1", Dims::axes(&["n"]))
                    .attr("valid_range", AttrValue::I64Array(vec![0, 255])),
            );
        let (c, _) = run(&def).unwrap();
        assert_eq!(
            c.attribute("flags", "valid_range"),
            Some(&AttrValue::typed_array(NumericArray::U8(vec![0, 255])))
        );
    }

    #[test]
    fn out_of_range_attribute_fails() {
        let def = SchemaDefinition::new().variable(
            "v",
            VariableSpec::new("u1", Dims::Scalar).attr("valid_max", AttrValue::I64(1000)),
        );
        assert!(matches!(
            run(&def).unwrap_err(),
            Error::Validation(ValidationError::AttributeRange { .. })
        ));
    }

    #[test]
    fn placeholder_and_existing_attributes_are_skipped() {
        let def = SchemaDefinition::new()
            .dimension("n", DimensionSpec::new(4))
            .variable("v", VariableSpec::new("i2", Dims::axes(&["n"])).attr("units", "K"))
            .global_attr("title", "demo")
            .global_attr("history", "TBW")
            .group_attr("v/units", "degC")
            .group_attr("v/valid_min", AttrValue::I64(-40))
            .group_attr("v/comment", "TBW");
        let (c, _) = run(&def).unwrap();
        assert_eq!(c.attribute("", "title"), Some(&AttrValue::from("demo")));
        assert_eq!(c.attribute("", "history"), None);
        assert_eq!(c.attribute("v", "units"), Some(&AttrValue::from("K")));
        assert_eq!(c.attribute("v", "comment"), None);
        assert_eq!(
            c.attribute("v", "valid_min"),
            Some(&AttrValue::typed_scalar(NumericArray::I16(vec![-40])))
        );
    }

    #[test]
    fn custom_placeholder() {
        let def = SchemaDefinition::new()
            .global_attr("a", "TBW")
            .global_attr("b", "TODO");
        let mut c = MemoryContainer::new();
        compile(&def, &mut c, &LayoutConfig::new().placeholder("TODO")).unwrap();
        assert_eq!(c.attribute("", "a"), Some(&AttrValue::from("TBW")));
        assert_eq!(c.attribute("", "b"), None);
    }

    #[test]
    fn unknown_attribute_owner_fails() {
        let def = SchemaDefinition::new().group_attr("nowhere/title", "x");
        assert!(matches!(
            run(&def).unwrap_err(),
            Error::Validation(ValidationError::UnknownNode { .. })
        ));
    }

    #[test]
    fn vlen_variables() {
        let def = SchemaDefinition::new()
            .dimension("time", DimensionSpec::new(0))
            .variable(
                "a",
                VariableSpec::new("u2", Dims::axes(&["time"]))
                    .vlen()
                    .fill_value(FillSpec::Number(Number::Int(0))),
            )
            .variable("b", VariableSpec::new("u2", Dims::axes(&["time"])).vlen());
        let (c, reg) = run(&def).unwrap();
        let a = c.variable("a").unwrap();
        assert_eq!(a.props.chunk_dims, Some(vec![16]));
        assert_eq!(a.props.fill_value, None);
        match &a.props.element {
            ElementType::Vlen { name, base, .. } => {
                assert_eq!(name, "u2_vlen");
                assert_eq!(**base, ElementType::Primitive(Dtype::U16));
            }
            other => panic!("unexpected element {other:?}"),
        }
        let b = c.variable("b").unwrap();
        assert_eq!(a.props.element, b.props.element);
        assert_eq!(c.types().count(), 1);
        assert!(reg.types.vlen("u2_vlen").is_some());
    }

    #[test]
    fn vlen_ignores_unrepresentable_fill() {
        // NaN cannot be stored in an integer type, but vlen drops the fill.
        let def = SchemaDefinition::new()
            .dimension("time", DimensionSpec::new(0))
            .variable(
                "counts",
                VariableSpec::new("i4", Dims::axes(&["time"]))
                    .vlen()
                    .fill_value(FillSpec::NaN),
            );
        let (c, _) = run(&def).unwrap();
        assert_eq!(c.variable("counts").unwrap().props.fill_value, None);
    }

    #[test]
    fn vlen_type_names() {
        assert_eq!(vlen_type_name("u2"), "u2_vlen");
        assert_eq!(vlen_type_name("f4_spectrum"), "f4_vlen");
    }

    #[test]
    fn explicit_values_round_trip() {
        let def = SchemaDefinition::new().dimension(
            "band",
            DimensionSpec::new(3)
                .dtype("u2")
                .values(AttrValue::I64Array(vec![270, 340, 765])),
        );
        let (c, _) = run(&def).unwrap();
        assert_eq!(
            c.variable("band").unwrap().data,
            Some(ArrayData::Numeric(NumericArray::U16(vec![270, 340, 765])))
        );
    }

    #[test]
    fn value_count_must_match_size() {
        let def = SchemaDefinition::new().dimension(
            "band",
            DimensionSpec::new(4)
                .dtype("u2")
                .values(AttrValue::I64Array(vec![1, 2, 3])),
        );
        assert!(matches!(
            run(&def).unwrap_err(),
            Error::Validation(ValidationError::ValueCount {
                expected: 4,
                found: 3,
                ..
            })
        ));
    }

    #[test]
    fn oversized_range_is_a_value_count_error() {
        let def = SchemaDefinition::new().dimension(
            "x",
            DimensionSpec::new(10).dtype("f4").range(vec![
                Number::Int(0),
                Number::Int(4_000_000_000),
                Number::Int(1),
            ]),
        );
        assert!(matches!(
            run(&def).unwrap_err(),
            Error::Validation(ValidationError::ValueCount {
                expected: 10,
                found: 4_000_000_000,
                ..
            })
        ));

        let def = SchemaDefinition::new().dimension(
            "y",
            DimensionSpec::new(10).dtype("f8").range(vec![
                Number::Float(0.0),
                Number::Float(1e300),
                Number::Float(1e-300),
            ]),
        );
        assert!(matches!(
            run(&def).unwrap_err(),
            Error::Validation(ValidationError::InvalidSpec { .. })
        ));
    }

    #[test]
    fn range_lengths() {
        let ints = |v: &[i64]| v.iter().map(|&x| Number::Int(x)).collect::<Vec<_>>();
        assert_eq!(range_len(&ints(&[0, 10, 3])), Ok(4));
        assert_eq!(range_len(&ints(&[5, 0, 1])), Ok(0));
        assert_eq!(range_len(&ints(&[i64::MIN, i64::MAX])), Ok(u64::MAX));
        assert_eq!(
            range_len(&[Number::Float(0.0), Number::Float(1.0), Number::Float(0.25)]),
            Ok(4)
        );
    }

    #[test]
    fn range_forms() {
        let ints = |v: &[i64]| v.iter().map(|&x| Number::Int(x)).collect::<Vec<_>>();
        assert_eq!(arange(&ints(&[3])).unwrap(), ints(&[0, 1, 2]));
        assert_eq!(arange(&ints(&[2, 5])).unwrap(), ints(&[2, 3, 4]));
        assert_eq!(arange(&ints(&[0, 10, 3])).unwrap(), ints(&[0, 3, 6, 9]));
        assert_eq!(arange(&ints(&[5, 0, -2])).unwrap(), ints(&[5, 3, 1]));
        assert!(arange(&ints(&[0, 5, 0])).is_err());
        assert!(arange(&[]).is_err());

        let floats = arange(&[Number::Float(0.0), Number::Float(1.0), Number::Float(0.25)])
            .unwrap();
        assert_eq!(
            floats,
            vec![0.0, 0.25, 0.5, 0.75]
                .into_iter()
                .map(Number::Float)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn unlimited_coordinate_variable() {
        let def = SchemaDefinition::new()
            .dimension("time", DimensionSpec::new(0).dtype("f8").attr("long_name", "time"))
            .dimension("scan", DimensionSpec::new(0).dtype("u4").chunks(ChunkSpec::Shape(vec![8])));
        let (c, _) = run(&def).unwrap();
        let time = c.variable("time").unwrap();
        assert_eq!(time.props.chunk_dims, Some(vec![50]));
        assert_eq!(time.props.maxshape, Some(vec![None]));
        assert_eq!(c.dimension("time").unwrap().scale.as_ref().unwrap().name, "time");
        assert_eq!(
            c.dimension("scan").unwrap().scale.as_ref().unwrap().name,
            NETCDF_DIMENSION_MARKER
        );
        assert_eq!(c.variable("scan").unwrap().props.chunk_dims, Some(vec![8]));
    }

    #[test]
    fn fill_values() {
        let def = SchemaDefinition::new()
            .dimension("n", DimensionSpec::new(2))
            .variable(
                "f",
                VariableSpec::new("f4", Dims::axes(&["n"])).fill_value(FillSpec::NaN),
            )
            .variable(
                "i",
                VariableSpec::new("i2", Dims::axes(&["n"]))
                    .fill_value(FillSpec::Number(Number::Int(-32767))),
            );
        let (c, _) = run(&def).unwrap();
        match &c.variable("f").unwrap().props.fill_value {
            Some(NumericArray::F32(v)) => assert!(v[0].is_nan()),
            other => panic!("unexpected fill {other:?}"),
        }
        assert_eq!(
            c.variable("i").unwrap().props.fill_value,
            Some(NumericArray::I16(vec![-32767]))
        );

        let def = SchemaDefinition::new()
            .variable("bad", VariableSpec::new("u1", Dims::Scalar).fill_value(FillSpec::NaN));
        assert!(matches!(
            run(&def).unwrap_err(),
            Error::Validation(ValidationError::FillValue { .. })
        ));
    }

    #[test]
    fn compression_requires_chunks() {
        let def = SchemaDefinition::new()
            .dimension("n", DimensionSpec::new(10))
            .dimension("time", DimensionSpec::new(0))
            .variable("small", VariableSpec::new("f4", Dims::axes(&["n"])).compression(4))
            .variable("grow", VariableSpec::new("f4", Dims::axes(&["time"])).compression(4));
        let (c, _) = run(&def).unwrap();
        let small = c.variable("small").unwrap();
        assert!(small.props.chunk_dims.is_none());
        assert_eq!(small.props.deflate_level, None);
        let grow = c.variable("grow").unwrap();
        assert_eq!(grow.props.deflate_level, Some(4));
        assert!(grow.props.shuffle);
    }

    #[test]
    fn explicit_chunks_are_validated() {
        let def = SchemaDefinition::new()
            .dimension("n", DimensionSpec::new(10))
            .variable(
                "v",
                VariableSpec::new("f4", Dims::axes(&["n"])).chunks(ChunkSpec::Shape(vec![4, 4])),
            );
        assert!(matches!(
            run(&def).unwrap_err(),
            Error::Validation(ValidationError::ChunkRank { .. })
        ));

        let def = SchemaDefinition::new()
            .dimension("n", DimensionSpec::new(10))
            .variable(
                "v",
                VariableSpec::new("f4", Dims::axes(&["n"])).chunks(ChunkSpec::Shape(vec![20])),
            );
        assert!(matches!(
            run(&def).unwrap_err(),
            Error::Validation(ValidationError::InvalidChunk { .. })
        ));
    }

    #[test]
    fn scoped_dimensions_and_implicit_groups() {
        let def = SchemaDefinition::new()
            .group("science")
            .dimension("time", DimensionSpec::new(0))
            .dimension("science/x", DimensionSpec::new(5).dtype("i4"))
            .variable(
                "science/data/v",
                VariableSpec::new("f8", Dims::axes(&["time", "x"])),
            )
            .variable(
                "other/w",
                VariableSpec::new("f8", Dims::axes(&["/science/x"])),
            );
        let (c, _) = run(&def).unwrap();
        assert!(c.is_group("science/data"));
        assert!(c.is_group("other"));
        let v = c.variable("science/data/v").unwrap();
        assert_eq!(v.props.shape, vec![0, 5]);
        assert_eq!(c.variable("other/w").unwrap().props.shape, vec![5]);
    }

    #[test]
    fn scalar_variables() {
        let def = SchemaDefinition::new().variable(
            "meta/orbit",
            VariableSpec::new("i4", Dims::Scalar)
                .fill_value(FillSpec::Number(Number::Int(-1)))
                .attr("long_name", "orbit number"),
        );
        let (c, reg) = run(&def).unwrap();
        let orbit = c.variable("meta/orbit").unwrap();
        assert!(orbit.props.shape.is_empty());
        assert_eq!(orbit.props.fill_value, Some(NumericArray::I32(vec![-1])));
        assert_eq!(reg.variables.get("meta/orbit").unwrap().dtype, Some(Dtype::I32));
    }

    #[test]
    fn compilation_is_deterministic() {
        let def = temp_schema().global_attr("title", "twice");
        let (a, _) = run(&def).unwrap();
        let (b, _) = run(&def).unwrap();
        assert_eq!(a, b);
    }
}
