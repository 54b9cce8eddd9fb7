// src/classfile/descriptor.rs

//! Field descriptor and member name validation

/// Check a field descriptor such as `I`, `[J` or `Ljava/lang/Object;`
pub fn is_field_descriptor(desc: &str) -> bool {
    let bytes = desc.as_bytes();
    let mut i = 0;
    let mut dims = 0;
    while i < bytes.len() && bytes[i] == b'[' {
        i += 1;
        dims += 1;
    }
    if dims > 255 || i >= bytes.len() {
        return false;
    }

    match bytes[i] {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => i + 1 == bytes.len(),
        b'L' => {
            let name = &desc[i + 1..];
            match name.strip_suffix(';') {
                Some(internal) => is_internal_name(internal),
                None => false,
            }
        }
        _ => false,
    }
}

/// Check a binary class name in internal form (`java/lang/Object`)
pub fn is_internal_name(name: &str) -> bool {
    !name.is_empty() && name.split('/').all(is_unqualified_name)
}

/// Check an unqualified field or method name
///
/// JVMS 4.2.2: non-empty, and none of `.` `;` `[` `/`.
pub fn is_unqualified_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['.', ';', '[', '/'])
}
