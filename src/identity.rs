use uuid::Uuid;

pub const DEFAULT_NAMESPACE: &str = "aced-ipd.org";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityResolver {
    namespace: Uuid,
}

impl IdentityResolver {
    pub fn new(namespace: Uuid) -> Self {
        Self { namespace }
    }

    pub fn from_dns_name(name: &str) -> Self {
        Self::new(Uuid::new_v3(&Uuid::NAMESPACE_DNS, name.as_bytes()))
    }

    pub fn namespace(&self) -> Uuid {
        self.namespace
    }

    pub fn resolve(&self, key: &str) -> Uuid {
        resolve(&self.namespace, key)
    }

    pub fn patient(&self, cell_line: &str) -> Uuid {
        self.resolve(&format!("Patient/{cell_line}"))
    }

    pub fn specimen(&self, specimen_name: &str) -> Uuid {
        self.resolve(&format!("Specimen/{specimen_name}"))
    }

    pub fn research_subject(&self, cell_line: &str) -> Uuid {
        self.resolve(&format!("ResearchSubject/{cell_line}"))
    }

    pub fn observation(&self, specimen_name: &str, assay: &str, count: usize) -> Uuid {
        self.resolve(&format!("Observation/{specimen_name}-{assay}-{count}"))
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::from_dns_name(DEFAULT_NAMESPACE)
    }
}

pub fn resolve(namespace: &Uuid, key: &str) -> Uuid {
    Uuid::new_v5(namespace, key.as_bytes())
}
