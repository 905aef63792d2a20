//! Shared fixtures for integration tests.
//!
//! The fixture schema mirrors a small company directory:
//! - `Department` and `Role` keyed by string ids
//! - `Employee` with lazy one-to-one links to both, stored in one table with
//!   its `SalaryEmployee` and `HourlyEmployee` variants
//! - `Project` with a list of department keys

#![allow(dead_code)]

use kvgraph_core::{
    AttributeDescriptor, BindOptions, Cardinality, GraphField, MemoryStore, Record, RecordStore,
    RecordType, RelationshipDescriptor, SchemaContext,
};
use std::sync::Arc;

pub fn department() -> RecordType {
    RecordType::new("Department", "departments")
        .attribute(AttributeDescriptor::string("id").hash_key())
        .attribute(AttributeDescriptor::string("name"))
}

pub fn role() -> RecordType {
    RecordType::new("Role", "roles")
        .attribute(AttributeDescriptor::string("id").hash_key())
        .attribute(AttributeDescriptor::string("name"))
}

pub fn employee() -> RecordType {
    RecordType::new("Employee", "employees")
        .attribute(AttributeDescriptor::string("id").hash_key())
        .attribute(AttributeDescriptor::string("name"))
        .attribute(AttributeDescriptor::datetime("hired_on").nullable())
        .attribute(AttributeDescriptor::relationship(
            "department",
            RelationshipDescriptor::one("Department"),
        ))
        .attribute(AttributeDescriptor::relationship(
            "role",
            RelationshipDescriptor::one("Role"),
        ))
        .discriminated_by("cls")
}

pub fn salary_employee() -> RecordType {
    employee()
        .variant("SalaryEmployee", "SalaryEmployee")
        .attribute(AttributeDescriptor::number("salary").nullable())
        .attribute(AttributeDescriptor::boolean("health").nullable())
}

pub fn hourly_employee() -> RecordType {
    employee()
        .variant("HourlyEmployee", "HourlyEmployee")
        .attribute(AttributeDescriptor::number("hourly").nullable())
}

pub fn project() -> RecordType {
    RecordType::new("Project", "projects")
        .attribute(AttributeDescriptor::number("id").hash_key())
        .attribute(AttributeDescriptor::string("name"))
        .attribute(AttributeDescriptor::relationship(
            "departments",
            RelationshipDescriptor::many("Department"),
        ))
}

/// Bind options shared by the employee types
pub fn employee_options() -> BindOptions {
    BindOptions::node()
        .exclude(["department", "role"])
        .field(GraphField::relationship(
            "department",
            "department",
            "Department",
            Cardinality::One,
        ))
        .field(GraphField::relationship("role", "role", "Role", Cardinality::One))
}

/// Register and bind the whole fixture schema
pub fn schema() -> SchemaContext {
    let context = SchemaContext::new();
    for record_type in [
        department(),
        role(),
        employee(),
        salary_employee(),
        hourly_employee(),
        project(),
    ] {
        context.register_model(record_type).unwrap();
    }

    let binder = context.binder();
    binder.bind("Department", BindOptions::node()).unwrap();
    binder.bind("Role", BindOptions::node()).unwrap();
    for name in ["Employee", "SalaryEmployee", "HourlyEmployee"] {
        binder.bind(name, employee_options()).unwrap();
    }
    binder
        .bind(
            "Project",
            BindOptions::node()
                .exclude(["departments"])
                .field(GraphField::relationship(
                    "departments",
                    "departments",
                    "Department",
                    Cardinality::Many,
                )),
        )
        .unwrap();
    context
}

/// Create every fixture table in `store` and fill it
pub async fn seed<S: RecordStore + ?Sized>(store: &S) {
    for record_type in [department(), role(), employee(), project()] {
        store.create_table(&record_type).await.unwrap();
    }

    let departments = department();
    for (id, name) in [("d1", "Engineering"), ("d2", "Human Resources")] {
        let record = Record::new("Department").with("id", id).with("name", name);
        store.put(&departments, &record).await.unwrap();
    }

    let roles = role();
    for (id, name) in [("r1", "manager"), ("r2", "engineer")] {
        let record = Record::new("Role").with("id", id).with("name", name);
        store.put(&roles, &record).await.unwrap();
    }

    let salaried = salary_employee();
    for (id, name, department, role, salary) in [
        ("e1", "Peter", "d1", "r1", 120_000),
        ("e2", "Roy", "d1", "r2", 95_000),
    ] {
        let record = salaried
            .new_record()
            .with("id", id)
            .with("name", name)
            .with("department", department)
            .with("role", role)
            .with("salary", salary)
            .with("health", true);
        store.put(&salaried, &record).await.unwrap();
    }

    let hourly = hourly_employee();
    let tracy = hourly
        .new_record()
        .with("id", "e3")
        .with("name", "Tracy")
        .with("department", "d2")
        .with("role", "r2")
        .with("hourly", 40);
    store.put(&hourly, &tracy).await.unwrap();

    let projects = project();
    let apollo = Record::new("Project")
        .with("id", 1)
        .with("name", "Apollo")
        .with(
            "departments",
            kvgraph_core::AttributeValue::List(vec!["d2".into(), "d1".into()]),
        );
    store.put(&projects, &apollo).await.unwrap();
}

/// Fixture schema plus a seeded in-memory store with zeroed counters
pub struct Fixture {
    pub context: SchemaContext,
    pub memory: Arc<MemoryStore>,
    pub store: Arc<dyn RecordStore>,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_store(MemoryStore::new()).await
    }

    pub async fn with_store(memory: MemoryStore) -> Self {
        let memory = Arc::new(memory);
        seed(memory.as_ref()).await;
        memory.reset_metrics();
        Self {
            context: schema(),
            store: Arc::clone(&memory) as Arc<dyn RecordStore>,
            memory,
        }
    }

    /// Stored employee record by id
    pub async fn employee(&self, id: &str) -> Record {
        let record = self
            .memory
            .get(&employee(), &kvgraph_core::PrimaryKey::hash(id))
            .await
            .unwrap()
            .unwrap();
        self.memory.reset_metrics();
        record
    }
}
