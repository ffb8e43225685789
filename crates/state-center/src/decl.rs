use globalstate_core_types::Graph;

/// Whether a declaration ships with the host or was introduced by user code.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Origin {
    Builtin,
    User,
}

#[derive(Clone, Debug)]
pub struct FieldDecl {
    pub name: String,
    /// Statically known default; `None` leaves the field uninitialized.
    pub default: Option<Graph>,
}

/// Declaration of a class and its shared fields.
#[derive(Clone, Debug)]
pub struct ClassDecl {
    pub name: String,
    pub origin: Origin,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub serializable: bool,
    pub fields: Vec<FieldDecl>,
}

impl ClassDecl {
    pub fn user(name: impl Into<String>) -> Self {
        Self::with_origin(name, Origin::User)
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        Self::with_origin(name, Origin::Builtin)
    }

    fn with_origin(name: impl Into<String>, origin: Origin) -> Self {
        Self {
            name: name.into(),
            origin,
            parent: None,
            interfaces: Vec::new(),
            serializable: true,
            fields: Vec::new(),
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// Marks instances as wrapping state a structural encode cannot carry.
    pub fn not_serializable(mut self) -> Self {
        self.serializable = false;
        self
    }

    pub fn field(mut self, name: impl Into<String>, default: Graph) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            default: Some(default),
        });
        self
    }

    pub fn uninitialized_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            default: None,
        });
        self
    }
}

#[derive(Clone, Debug)]
pub struct InterfaceDecl {
    pub name: String,
    pub origin: Origin,
    pub extends: Vec<String>,
}

impl InterfaceDecl {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: Origin::User,
            extends: Vec::new(),
        }
    }

    pub fn builtin(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: Origin::Builtin,
            extends: Vec::new(),
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.extends.push(parent.into());
        self
    }
}
