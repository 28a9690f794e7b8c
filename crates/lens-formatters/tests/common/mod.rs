//! Shared test fixture: a stopped process holding a small class hierarchy,
//! string objects, a cyclic list and a vector.
//!
//! ```text
//! 0x1000  MyClass       object       -> isa 0x9100
//! 0x1100  MyOtherClass  object2      -> isa 0x9200
//! 0x2000  __NSCFString  inline, explicit length   "Hello"
//! 0x2100  __NSCFString  mutable, out of line      "abc" at 0x2800
//! 0x2200  __NSCFString  inline, length byte       "hi"
//! 0x2300  __NSCFString  inline, unicode           "ok"
//! 0x3000  Node <-> 0x3010 Node
//! 0x4000  std::__1::vector<int> { 10, 20, 30 } at 0x4100
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use lens_formatters::{
    ClassState, Field, FormatterRegistry, MemorySnapshot, Target, TypeDescriptor, Value,
    ValueRenderer,
};

pub use pretty_assertions::{assert_eq, assert_ne};

pub const STRING_ISA: u64 = 0x9300;

pub struct Fixture {
    pub snapshot: Arc<MemorySnapshot>,
    pub my_class: Arc<TypeDescriptor>,
    pub my_other_class: Arc<TypeDescriptor>,
    /// `MyClass *`
    pub object: Value,
    /// `MyOtherClass *`
    pub object2: Value,
    /// `id`, really a `__NSCFString`
    pub dyn_test: Value,
    /// `NSString *` values
    pub str_inline: Value,
    pub str_mutable: Value,
    pub str_pascal: Value,
    pub str_unicode: Value,
    /// First node of a two-node cycle
    pub head: Value,
    pub numbers: Value,
}

fn isa_field() -> Field {
    Field::new("isa", &TypeDescriptor::unsigned_long(), 0)
}

/// `Node` as debug info describes it: `next` points at a shallower copy, the
/// innermost one a forward declaration without fields
fn node_type(levels: usize) -> Arc<TypeDescriptor> {
    let fields = if levels == 0 {
        Vec::new()
    } else {
        vec![
            Field::new("value", &TypeDescriptor::int(), 0),
            Field::new("next", &TypeDescriptor::pointer_to(&node_type(levels - 1)), 8),
        ]
    };
    Arc::new(TypeDescriptor::record("Node", 16, fields))
}

fn vector_type() -> Arc<TypeDescriptor> {
    let int_ptr = TypeDescriptor::pointer_to(&TypeDescriptor::int());
    Arc::new(TypeDescriptor::record(
        "std::__1::vector<int>",
        24,
        vec![
            Field::new("__begin_", &int_ptr, 0),
            Field::new("__end_", &int_ptr, 8),
            Field::new("__end_cap_", &int_ptr, 16),
        ],
    ))
}

impl Fixture {
    pub fn new() -> Self {
        let snapshot = Arc::new(MemorySnapshot::new());

        let my_class = Arc::new(
            TypeDescriptor::object(
                "MyClass",
                16,
                vec![isa_field(), Field::new("i", &TypeDescriptor::int(), 8)],
            )
            .with_superclasses(["NSObject"]),
        );
        let my_other_class = Arc::new(
            TypeDescriptor::object(
                "MyOtherClass",
                24,
                vec![
                    Field::new("MyClass", &my_class, 0),
                    Field::new("backup", &TypeDescriptor::int(), 16),
                ],
            )
            .with_superclasses(["MyClass", "NSObject"]),
        );
        let ns_string = Arc::new(
            TypeDescriptor::object("NSString", 8, vec![isa_field()]).with_superclasses(["NSObject"]),
        );
        let cf_string = Arc::new(
            TypeDescriptor::object("__NSCFString", 16, vec![isa_field()])
                .with_superclasses(["NSMutableString", "NSString", "NSObject"]),
        );
        for ty in [&my_class, &my_other_class, &ns_string, &cf_string] {
            snapshot.register_type(ty);
        }

        snapshot.register_class(0x9100, "MyClass", ClassState::Loaded);
        snapshot.register_class(0x9200, "MyOtherClass", ClassState::Loaded);
        snapshot.register_class(STRING_ISA, "__NSCFString", ClassState::Lazy);

        snapshot.write_u64(0x1000, 0x9100);
        snapshot.write_i32(0x1008, 1);
        snapshot.write_i32(0x100c, 0);
        snapshot.set_description(0x1000, "<MyClass: 0x1000>");

        snapshot.write_u64(0x1100, 0x9200);
        snapshot.write_i32(0x1108, 2);
        snapshot.write_i32(0x110c, 0);
        snapshot.write_i32(0x1110, 3);
        snapshot.write_i32(0x1114, 0);

        // Inline, explicit u32 length
        snapshot.write_u64(0x2000, STRING_ISA);
        snapshot.write_bytes(0x2008, &[0; 8]);
        snapshot.write_u32(0x2010, 5);
        snapshot.write_bytes(0x2014, b"Hello");

        // Mutable, out of line, explicit u64 length
        snapshot.write_u64(0x2100, STRING_ISA);
        snapshot.write_bytes(0x2108, &[0x41, 0, 0, 0, 0, 0, 0, 0]);
        snapshot.write_u64(0x2110, 0x2800);
        snapshot.write_u64(0x2118, 3);
        snapshot.write_bytes(0x2800, b"abc");

        // Inline, length byte
        snapshot.write_u64(0x2200, STRING_ISA);
        snapshot.write_bytes(0x2208, &[0x04, 0, 0, 0, 0, 0, 0, 0]);
        snapshot.write_u8(0x2210, 2);
        snapshot.write_bytes(0x2211, b"hi");

        // Inline, explicit length, UTF-16LE
        snapshot.write_u64(0x2300, STRING_ISA);
        snapshot.write_bytes(0x2308, &[0x10, 0, 0, 0, 0, 0, 0, 0]);
        snapshot.write_u32(0x2310, 2);
        snapshot.write_bytes(0x2314, &[b'o', 0, b'k', 0]);

        snapshot.write_i32(0x3000, 1);
        snapshot.write_i32(0x3004, 0);
        snapshot.write_u64(0x3008, 0x3010);
        snapshot.write_i32(0x3010, 2);
        snapshot.write_i32(0x3014, 0);
        snapshot.write_u64(0x3018, 0x3000);

        snapshot.write_u64(0x4000, 0x4100);
        snapshot.write_u64(0x4008, 0x410c);
        snapshot.write_u64(0x4010, 0x4110);
        for (i, n) in [10, 20, 30].into_iter().enumerate() {
            snapshot.write_i32(0x4100 + 4 * i as u64, n);
        }
        snapshot.write_i32(0x410c, 0);

        let string_ptr = TypeDescriptor::pointer_to(&ns_string);
        let id = string_ptr.renamed("id");

        let head = snapshot
            .value_at("head", &node_type(3), 0x3000)
            .expect("node in snapshot");
        let numbers = snapshot
            .value_at("numbers", &vector_type(), 0x4000)
            .expect("vector in snapshot");

        Self {
            object: Value::pointer("object", &TypeDescriptor::pointer_to(&my_class), 0x1000),
            object2: Value::pointer(
                "object2",
                &TypeDescriptor::pointer_to(&my_other_class),
                0x1100,
            ),
            dyn_test: Value::pointer("dyn_test", &id, 0x2000),
            str_inline: Value::pointer("str_inline", &string_ptr, 0x2000),
            str_mutable: Value::pointer("str_mutable", &string_ptr, 0x2100),
            str_pascal: Value::pointer("str_pascal", &string_ptr, 0x2200),
            str_unicode: Value::pointer("str_unicode", &string_ptr, 0x2300),
            head,
            numbers,
            my_class,
            my_other_class,
            snapshot,
        }
    }

    /// Renderer over this snapshot
    pub fn renderer(&self, registry: Arc<FormatterRegistry>) -> ValueRenderer {
        ValueRenderer::new(registry, Arc::clone(&self.snapshot) as Arc<dyn Target>)
    }

    /// Renderer over a registry holding the built-ins
    pub fn builtin_renderer(&self) -> ValueRenderer {
        self.renderer(Arc::new(FormatterRegistry::with_builtins()))
    }
}
