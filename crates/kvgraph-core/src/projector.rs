//! Field Projector
//!
//! Builds the field set of a graph type from a record type's attributes.

use crate::convert::AttributeConverter;
use crate::error::SchemaError;
use crate::graph::GraphField;
use crate::model::{AttributeKind, RecordType};
use std::collections::BTreeMap;

/// Projects record-type attributes onto graph fields
pub struct FieldProjector<'a> {
    converter: &'a AttributeConverter,
}

impl<'a> FieldProjector<'a> {
    pub fn new(converter: &'a AttributeConverter) -> Self {
        Self { converter }
    }

    /// Fields for `record_type`, keyed (and ordered) by name
    ///
    /// Attributes are visited in name order; the first attribute of a name
    /// wins. A non-empty `only_fields` keeps just those names; `exclude_fields`
    /// drops names. Relationship attributes must be excluded, they cannot be
    /// projected automatically.
    pub fn project(
        &self,
        record_type: &RecordType,
        only_fields: &[String],
        exclude_fields: &[String],
    ) -> Result<BTreeMap<String, GraphField>, SchemaError> {
        let mut attributes: Vec<_> = record_type.attributes().iter().collect();
        attributes.sort_by(|a, b| a.name.cmp(&b.name));

        let mut fields = BTreeMap::new();
        for attribute in attributes {
            let name = &attribute.name;
            let not_in_only = !only_fields.is_empty() && !only_fields.contains(name);
            if not_in_only || exclude_fields.contains(name) || fields.contains_key(name) {
                continue;
            }

            if let AttributeKind::Relationship(_) = attribute.kind {
                return Err(SchemaError::UnsupportedRelationshipProjection {
                    record_type: record_type.name().to_string(),
                    attribute: name.clone(),
                });
            }
            fields.insert(name.clone(), self.converter.convert(attribute)?);
        }
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttributeDescriptor, RelationshipDescriptor};
    use pretty_assertions::assert_eq;

    fn user() -> RecordType {
        RecordType::new("User", "users")
            .attribute(AttributeDescriptor::string("name"))
            .attribute(AttributeDescriptor::string("id").hash_key())
            .attribute(AttributeDescriptor::string("email").nullable())
    }

    fn names(fields: &BTreeMap<String, GraphField>) -> Vec<&str> {
        fields.keys().map(String::as_str).collect()
    }

    #[test]
    fn test_projects_every_attribute_in_name_order() {
        let converter = AttributeConverter::new();
        let fields = FieldProjector::new(&converter).project(&user(), &[], &[]).unwrap();
        assert_eq!(names(&fields), vec!["email", "id", "name"]);
    }

    #[test]
    fn test_only_and_exclude() {
        let converter = AttributeConverter::new();
        let projector = FieldProjector::new(&converter);

        let only = projector.project(&user(), &["name".to_string()], &[]).unwrap();
        assert_eq!(names(&only), vec!["name"]);

        let excluded = projector.project(&user(), &[], &["email".to_string()]).unwrap();
        assert_eq!(names(&excluded), vec!["id", "name"]);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let converter = AttributeConverter::new();
        let rt = user().attribute(AttributeDescriptor::number("name"));
        let fields = FieldProjector::new(&converter).project(&rt, &[], &[]).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(fields["name"].field_type.to_string(), "String");
    }

    #[test]
    fn test_relationships_must_be_excluded() {
        let converter = AttributeConverter::new();
        let projector = FieldProjector::new(&converter);
        let rt = user().attribute(AttributeDescriptor::relationship(
            "department",
            RelationshipDescriptor::one("Department"),
        ));

        assert_eq!(
            projector.project(&rt, &[], &[]).unwrap_err(),
            SchemaError::UnsupportedRelationshipProjection {
                record_type: "User".to_string(),
                attribute: "department".to_string(),
            }
        );
        assert!(projector
            .project(&rt, &[], &["department".to_string()])
            .is_ok());
    }
}
