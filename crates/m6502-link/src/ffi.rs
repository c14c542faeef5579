//! C ABI over an opaque [`Link`] pointer.
//!
//! Every call returns a host status code (`LIBRARY_NO_ERROR` on success)
//! and writes results through out-pointers. A null link or out-pointer is
//! `LIBRARY_MEMORY_ERROR`. The link is not synchronised: the host must
//! serialise calls on one link.

#![allow(unsafe_code)]

use std::ffi::{CStr, c_char};

use emu_core::Register;
use mos_6502::Mos6502Config;

use crate::error::{
    LIBRARY_FUNCTION_ERROR, LIBRARY_MEMORY_ERROR, LIBRARY_NO_ERROR, LIBRARY_TYPE_ERROR,
};
use crate::{Handle, Link, LinkError, RegisterArgs};

/// Run `f` against the link behind `link`.
///
/// # Safety
///
/// `link` must be null or a pointer from [`m6502_link_new`] that has not
/// been freed.
unsafe fn with_link(link: *mut Link, f: impl FnOnce(&mut Link) -> i32) -> i32 {
    match unsafe { link.as_mut() } {
        Some(link) => f(link),
        None => LIBRARY_MEMORY_ERROR,
    }
}

/// Store a successful result through `out`.
///
/// # Safety
///
/// `out` must be null or valid for a write of `T`.
unsafe fn store<T>(out: *mut T, result: Result<T, LinkError>) -> i32 {
    match result {
        Ok(value) => match unsafe { out.as_mut() } {
            Some(slot) => {
                *slot = value;
                LIBRARY_NO_ERROR
            }
            None => LIBRARY_MEMORY_ERROR,
        },
        Err(err) => err.code(),
    }
}

/// Run a call that reports through `out`. A null `out` fails before the
/// link is touched.
///
/// # Safety
///
/// As for [`with_link`] and [`store`].
unsafe fn with_link_out<T>(
    link: *mut Link,
    out: *mut T,
    f: impl FnOnce(&mut Link) -> Result<T, LinkError>,
) -> i32 {
    if out.is_null() {
        return LIBRARY_MEMORY_ERROR;
    }
    unsafe { with_link(link, |link| store(out, f(link))) }
}

fn status(result: Result<(), LinkError>) -> i32 {
    result.map_or_else(|err| err.code(), |()| LIBRARY_NO_ERROR)
}

/// New link with decimal mode enabled. Free with [`m6502_link_free`].
#[unsafe(no_mangle)]
pub extern "C" fn m6502_link_new() -> *mut Link {
    Box::into_raw(Box::new(Link::new()))
}

/// New link whose cores treat the D flag as inert when `bcd_disabled`.
#[unsafe(no_mangle)]
pub extern "C" fn m6502_link_new_with_config(bcd_disabled: bool) -> *mut Link {
    Box::into_raw(Box::new(Link::with_config(Mos6502Config { bcd_disabled })))
}

/// Drop a link and every instance it owns.
///
/// # Safety
///
/// `link` must be null or a live pointer from `m6502_link_new*`; it is
/// invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn m6502_link_free(link: *mut Link) {
    if !link.is_null() {
        drop(unsafe { Box::from_raw(link) });
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn m6502_library_version() -> i64 {
    <Link>::library_version()
}

/// Instance-manager callback: `mode` 0 creates, anything else destroys.
///
/// # Safety
///
/// `link` must be null or a live pointer from `m6502_link_new*`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn m6502_manage_instance(link: *mut Link, mode: i64, handle: Handle) -> i32 {
    unsafe {
        with_link(link, |link| {
            link.manage_instance(mode, handle);
            LIBRARY_NO_ERROR
        })
    }
}

/// # Safety
///
/// `link` must be null or a live pointer from `m6502_link_new*`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn m6502_create_instance(link: *mut Link, handle: Handle) -> i32 {
    unsafe {
        with_link(link, |link| {
            link.create_instance(handle);
            LIBRARY_NO_ERROR
        })
    }
}

/// # Safety
///
/// `link` must be null or a live pointer from `m6502_link_new*`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn m6502_destroy_instance(link: *mut Link, handle: Handle) -> i32 {
    unsafe {
        with_link(link, |link| {
            link.destroy_instance(handle);
            LIBRARY_NO_ERROR
        })
    }
}

/// Forward one clock edge; the pins the core drives go to `out`.
///
/// # Safety
///
/// `link` must be null or live; `out` must be valid for one `i64` write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn m6502_tick(
    link: *mut Link,
    handle: Handle,
    pins: i64,
    out: *mut i64,
) -> i32 {
    unsafe { with_link_out(link, out, |link| link.tick(handle, pins)) }
}

/// Strict SetState: all six values are checked before any is written.
///
/// # Safety
///
/// `link` must be null or a live pointer from `m6502_link_new*`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn m6502_set_state(
    link: *mut Link,
    handle: Handle,
    pc: i64,
    a: i64,
    x: i64,
    y: i64,
    s: i64,
    p: i64,
) -> i32 {
    let args = RegisterArgs { pc, a, x, y, s, p };
    unsafe { with_link(link, |link| status(link.set_state(handle, args))) }
}

/// SetRegister by host name (`"PC"`, `"A"`, ...). The value read back
/// goes to `out`.
///
/// # Safety
///
/// `link` must be null or live; `name` must be null or a NUL-terminated string and
/// `out` valid for one `i64` write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn m6502_set_register(
    link: *mut Link,
    handle: Handle,
    name: *const c_char,
    value: i64,
    out: *mut i64,
) -> i32 {
    if name.is_null() {
        return LIBRARY_MEMORY_ERROR;
    }
    let name = unsafe { CStr::from_ptr(name) };
    let Some(register) = name.to_str().ok().and_then(|n| n.parse::<Register>().ok()) else {
        return LIBRARY_TYPE_ERROR;
    };
    unsafe { with_link_out(link, out, |link| link.set_register(handle, register, value)) }
}

/// # Safety
///
/// See [`m6502_tick`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn m6502_set_program_counter(
    link: *mut Link,
    handle: Handle,
    value: i64,
    out: *mut i64,
) -> i32 {
    unsafe { with_link_out(link, out, |link| link.set_program_counter(handle, value)) }
}

/// # Safety
///
/// See [`m6502_tick`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn m6502_set_stack_pointer(
    link: *mut Link,
    handle: Handle,
    value: i64,
    out: *mut i64,
) -> i32 {
    unsafe { with_link_out(link, out, |link| link.set_stack_pointer(handle, value)) }
}

/// # Safety
///
/// See [`m6502_tick`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn m6502_set_processor_status(
    link: *mut Link,
    handle: Handle,
    value: i64,
    out: *mut i64,
) -> i32 {
    unsafe { with_link_out(link, out, |link| link.set_processor_status(handle, value)) }
}

/// Registers PC, A, X, Y, S, P into `out[0..6]`.
///
/// # Safety
///
/// `link` must be null or live; `out` must be valid for six `i64` writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn m6502_get_registers(
    link: *mut Link,
    handle: Handle,
    out: *mut [i64; 6],
) -> i32 {
    unsafe { with_link_out(link, out, |link| link.registers(handle)) }
}

/// `[opcode, step]` into `out[0..2]`.
///
/// # Safety
///
/// `link` must be null or live; `out` must be valid for two `i64` writes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn m6502_get_instruction_register(
    link: *mut Link,
    handle: Handle,
    out: *mut [i64; 2],
) -> i32 {
    unsafe { with_link_out(link, out, |link| link.instruction_register(handle)) }
}

/// GetState as a NUL-terminated JSON document in `buf`.
///
/// `written` receives the document length without the terminator. When
/// `buf` is too small nothing is copied, `written` still receives the
/// length, and the call fails with `LIBRARY_MEMORY_ERROR`.
///
/// # Safety
///
/// `link` must be null or live; `buf` must be valid for `len` bytes and `written`
/// for one `usize` write.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn m6502_get_state_json(
    link: *mut Link,
    handle: Handle,
    buf: *mut c_char,
    len: usize,
    written: *mut usize,
) -> i32 {
    let json = match unsafe { link.as_ref() }.map(|link| link.get_state(handle)) {
        None => return LIBRARY_MEMORY_ERROR,
        Some(Err(err)) => return err.code(),
        Some(Ok(snapshot)) => match snapshot.to_json() {
            Ok(json) => json,
            Err(_) => return LIBRARY_FUNCTION_ERROR,
        },
    };
    let Some(written) = (unsafe { written.as_mut() }) else {
        return LIBRARY_MEMORY_ERROR;
    };
    *written = json.len();
    if buf.is_null() || len <= json.len() {
        return LIBRARY_MEMORY_ERROR;
    }
    unsafe {
        std::ptr::copy_nonoverlapping(json.as_ptr().cast::<c_char>(), buf, json.len());
        *buf.add(json.len()) = 0;
    }
    LIBRARY_NO_ERROR
}
