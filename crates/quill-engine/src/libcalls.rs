//! Runtime routines Cranelift may emit calls to on its own.
//!
//! Code generation lowers some instructions (float rounding without the
//! matching CPU feature, large memory copies) to calls of well-known C
//! library names. These resolve here unless the session imported its own
//! definition under the same name.

extern "C" fn quill_ceilf(x: f32) -> f32 {
    x.ceil()
}

extern "C" fn quill_ceil(x: f64) -> f64 {
    x.ceil()
}

extern "C" fn quill_floorf(x: f32) -> f32 {
    x.floor()
}

extern "C" fn quill_floor(x: f64) -> f64 {
    x.floor()
}

extern "C" fn quill_truncf(x: f32) -> f32 {
    x.trunc()
}

extern "C" fn quill_trunc(x: f64) -> f64 {
    x.trunc()
}

extern "C" fn quill_nearbyintf(x: f32) -> f32 {
    x.round_ties_even()
}

extern "C" fn quill_nearbyint(x: f64) -> f64 {
    x.round_ties_even()
}

extern "C" fn quill_fmaf(a: f32, b: f32, c: f32) -> f32 {
    a.mul_add(b, c)
}

extern "C" fn quill_fma(a: f64, b: f64, c: f64) -> f64 {
    a.mul_add(b, c)
}

/// Looks up a built-in routine by its C library name.
pub fn lookup(name: &str) -> Option<*const u8> {
    let address = match name {
        "ceilf" => quill_ceilf as *const u8,
        "ceil" => quill_ceil as *const u8,
        "floorf" => quill_floorf as *const u8,
        "floor" => quill_floor as *const u8,
        "truncf" => quill_truncf as *const u8,
        "trunc" => quill_trunc as *const u8,
        "nearbyintf" => quill_nearbyintf as *const u8,
        "nearbyint" => quill_nearbyint as *const u8,
        "fmaf" => quill_fmaf as *const u8,
        "fma" => quill_fma as *const u8,
        "memcpy" => libc::memcpy as *const u8,
        "memset" => libc::memset as *const u8,
        "memmove" => libc::memmove as *const u8,
        "memcmp" => libc::memcmp as *const u8,
        _ => return None,
    };
    Some(address)
}
