//! Demo company schema served by the CLI
//!
//! Departments and roles, plus employees in one table with salaried and hourly
//! variants. Every employee links to a department and a role.

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use kvgraph_config::KvGraphConfig;
use kvgraph_core::{
    AttributeDescriptor, BindOptions, Cardinality, DefaultValue, GraphField, PageLimits, Record,
    RecordStore, RecordType, RelationshipDescriptor, SchemaContext,
};
use tracing::debug;
use uuid::Uuid;

fn department() -> RecordType {
    RecordType::new("Department", "department")
        .attribute(AttributeDescriptor::string("id").hash_key())
        .attribute(AttributeDescriptor::string("name"))
}

fn role() -> RecordType {
    RecordType::new("Role", "roles")
        .attribute(AttributeDescriptor::string("id").hash_key())
        .attribute(AttributeDescriptor::string("name"))
}

fn employee(lazy: bool) -> RecordType {
    RecordType::new("Employee", "employee")
        .attribute(AttributeDescriptor::string("id").hash_key())
        .attribute(AttributeDescriptor::string("name"))
        .attribute(AttributeDescriptor::datetime("hired_on").with_default(DefaultValue::Now))
        .attribute(AttributeDescriptor::relationship(
            "department",
            RelationshipDescriptor::one("Department").with_lazy(lazy),
        ))
        .attribute(AttributeDescriptor::relationship(
            "role",
            RelationshipDescriptor::one("Role").with_lazy(lazy),
        ))
        .discriminated_by("cls")
}

fn salary_employee(lazy: bool) -> RecordType {
    employee(lazy)
        .variant("SalaryEmployee", "SalaryEmployee")
        .attribute(AttributeDescriptor::number("salary").nullable())
        .attribute(AttributeDescriptor::boolean("health").nullable())
}

fn hourly_employee(lazy: bool) -> RecordType {
    employee(lazy)
        .variant("HourlyEmployee", "HourlyEmployee")
        .attribute(AttributeDescriptor::number("hourly").nullable())
}

/// Record types whose tables back the demo schema
fn tables() -> [RecordType; 3] {
    [department(), role(), employee(true)]
}

/// Register and bind the demo schema
pub fn schema(config: &KvGraphConfig) -> Result<SchemaContext> {
    let lazy = config.relationships.lazy;
    let context = SchemaContext::new().with_page_limits(PageLimits {
        default_page_size: config.pagination.default_page_size,
        max_page_size: config.pagination.max_page_size,
    });

    for record_type in [
        department(),
        role(),
        employee(lazy),
        salary_employee(lazy),
        hourly_employee(lazy),
    ] {
        context.register_model(record_type)?;
    }

    let binder = context.binder();
    binder.bind("Department", BindOptions::node())?;
    binder.bind("Role", BindOptions::node())?;
    for name in ["Employee", "SalaryEmployee", "HourlyEmployee"] {
        let options = BindOptions::node()
            .exclude(["department", "role"])
            .field(GraphField::relationship(
                "department",
                "department",
                "Department",
                Cardinality::One,
            ))
            .field(GraphField::relationship("role", "role", "Role", Cardinality::One));
        binder
            .bind(name, options)
            .with_context(|| format!("Failed to bind {}", name))?;
    }

    debug!("Demo schema bound {} types", context.types().len());
    Ok(context)
}

/// Whether every demo table exists in `store`
pub async fn is_initialized(store: &dyn RecordStore) -> Result<bool> {
    for record_type in tables() {
        if !store.table_exists(&record_type).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Drop every demo table
pub async fn reset(store: &dyn RecordStore) -> Result<()> {
    for record_type in tables() {
        if store.table_exists(&record_type).await? {
            store.delete_table(&record_type).await?;
        }
    }
    Ok(())
}

/// Counts of seeded records
#[derive(Debug, Default, Clone, Copy)]
pub struct SeedStats {
    pub departments: usize,
    pub roles: usize,
    pub employees: usize,
}

/// Create the demo tables and seed the fixture records
///
/// `extra_employees` more salaried employees are added round-robin across
/// departments, advancing `progress` once per record.
pub async fn seed(
    store: &dyn RecordStore,
    extra_employees: usize,
    progress: Option<&ProgressBar>,
) -> Result<SeedStats> {
    for record_type in tables() {
        store.create_table(&record_type).await?;
    }
    let mut stats = SeedStats::default();

    let departments = department();
    let mut department_ids = Vec::new();
    for name in ["Engineering", "Human Resources"] {
        let id = Uuid::new_v4().to_string();
        let record = Record::new("Department")
            .with("id", id.as_str())
            .with("name", name);
        store.put(&departments, &record).await?;
        department_ids.push(id);
        stats.departments += 1;
    }

    let roles = role();
    let mut role_ids = Vec::new();
    for name in ["manager", "engineer"] {
        let id = Uuid::new_v4().to_string();
        let record = Record::new("Role").with("id", id.as_str()).with("name", name);
        store.put(&roles, &record).await?;
        role_ids.push(id);
        stats.roles += 1;
    }

    let salaried = salary_employee(true);
    let hourly = hourly_employee(true);
    let fixtures = [
        (&salaried, "Peter", 0, 0),
        (&salaried, "Roy", 0, 1),
        (&hourly, "Tracy", 1, 1),
    ];
    for (record_type, name, department, role) in fixtures {
        let record = record_type
            .new_record()
            .with("id", Uuid::new_v4().to_string())
            .with("name", name)
            .with("department", department_ids[department].as_str())
            .with("role", role_ids[role].as_str());
        store.put(record_type, &record).await?;
        stats.employees += 1;
    }

    for i in 0..extra_employees {
        let record = salaried
            .new_record()
            .with("id", Uuid::new_v4().to_string())
            .with("name", format!("Employee {}", i + 1))
            .with("department", department_ids[i % department_ids.len()].as_str())
            .with("role", role_ids[1].as_str())
            .with("salary", 50_000 + (i as i64 % 50) * 1_000)
            .with("health", i % 2 == 0);
        store.put(&salaried, &record).await?;
        stats.employees += 1;
        if let Some(pb) = progress {
            pb.inc(1);
        }
    }

    Ok(stats)
}
