//! Adapter over the private MediaRemote framework.
//!
//! The framework is loaded by path at runtime and the entry point is looked
//! up by name, so nothing links against it at build time.

use std::ffi::{c_char, c_void, CStr};
use std::sync::mpsc;
use std::time::Duration;

use block2::{Block, RcBlock};
use core_foundation::base::{CFType, TCFType};
use core_foundation::data::CFData;
use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
use core_foundation::number::CFNumber;
use core_foundation::string::CFString;
use parking_lot::Mutex;

use crate::source::{NowPlayingSource, SourceError};
use crate::types::NowPlayingSnapshot;

const FRAMEWORK_PATH: &[u8] =
    b"/System/Library/PrivateFrameworks/MediaRemote.framework/MediaRemote\0";
const GET_NOW_PLAYING_INFO: &[u8] = b"MRMediaRemoteGetNowPlayingInfo\0";

const KEY_TITLE: &str = "kMRMediaRemoteNowPlayingInfoTitle";
const KEY_ARTIST: &str = "kMRMediaRemoteNowPlayingInfoArtist";
const KEY_ARTWORK: &str = "kMRMediaRemoteNowPlayingInfoArtworkData";
const KEY_PLAYBACK_RATE: &str = "kMRMediaRemoteNowPlayingInfoPlaybackRate";

const REPLY_TIMEOUT: Duration = Duration::from_millis(500);

/// `void MRMediaRemoteGetNowPlayingInfo(dispatch_queue_t, void (^)(CFDictionaryRef))`
type GetNowPlayingInfoFn =
    unsafe extern "C" fn(queue: *mut c_void, handler: &Block<dyn Fn(*const c_void)>);

extern "C" {
    fn dispatch_get_global_queue(identifier: isize, flags: usize) -> *mut c_void;
}

pub struct MediaRemoteSource {
    get_info: Mutex<Option<GetNowPlayingInfoFn>>,
}

impl MediaRemoteSource {
    pub fn new() -> Self {
        Self {
            get_info: Mutex::new(None),
        }
    }

    /// Resolve the entry point once; failures are retried on the next call
    fn resolve(&self) -> Result<GetNowPlayingInfoFn, SourceError> {
        let mut cached = self.get_info.lock();
        if let Some(get_info) = *cached {
            return Ok(get_info);
        }

        let get_info = unsafe { resolve_symbol()? };
        log::info!("Resolved MRMediaRemoteGetNowPlayingInfo");
        *cached = Some(get_info);
        Ok(get_info)
    }
}

impl NowPlayingSource for MediaRemoteSource {
    fn fetch(&self) -> Result<Option<NowPlayingSnapshot>, SourceError> {
        let get_info = self.resolve()?;

        let (tx, rx) = mpsc::sync_channel(1);
        let handler: RcBlock<dyn Fn(*const c_void)> = RcBlock::new(move |info: *const c_void| {
            // The dictionary is only valid for the duration of the callback
            let snapshot = unsafe { snapshot_from_dictionary(info) };
            let _ = tx.try_send(snapshot);
        });

        unsafe {
            let queue = dispatch_get_global_queue(0, 0);
            get_info(queue, &handler);
        }

        rx.recv_timeout(REPLY_TIMEOUT).map_err(|_| SourceError::Timeout)
    }
}

unsafe fn resolve_symbol() -> Result<GetNowPlayingInfoFn, SourceError> {
    let handle = libc::dlopen(FRAMEWORK_PATH.as_ptr() as *const c_char, libc::RTLD_LAZY);
    if handle.is_null() {
        return Err(SourceError::FrameworkUnavailable(last_dl_error()));
    }

    let symbol = libc::dlsym(handle, GET_NOW_PLAYING_INFO.as_ptr() as *const c_char);
    if symbol.is_null() {
        let reason = last_dl_error();
        libc::dlclose(handle);
        return Err(SourceError::SymbolMissing(reason));
    }

    // The framework handle stays open for the life of the process
    Ok(std::mem::transmute::<*mut c_void, GetNowPlayingInfoFn>(symbol))
}

fn last_dl_error() -> String {
    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            "unknown dlerror".to_string()
        } else {
            CStr::from_ptr(err).to_string_lossy().into_owned()
        }
    }
}

unsafe fn snapshot_from_dictionary(info: *const c_void) -> Option<NowPlayingSnapshot> {
    if info.is_null() {
        return None;
    }

    let dict: CFDictionary<CFString, CFType> =
        CFDictionary::wrap_under_get_rule(info as CFDictionaryRef);

    let snapshot = NowPlayingSnapshot {
        title: lookup(&dict, KEY_TITLE)
            .and_then(|v| v.downcast::<CFString>())
            .map(|s| s.to_string()),
        artist: lookup(&dict, KEY_ARTIST)
            .and_then(|v| v.downcast::<CFString>())
            .map(|s| s.to_string()),
        artwork: lookup(&dict, KEY_ARTWORK)
            .and_then(|v| v.downcast::<CFData>())
            .map(|data| data.bytes().to_vec())
            .filter(|bytes| !bytes.is_empty()),
        playback_rate: lookup(&dict, KEY_PLAYBACK_RATE)
            .and_then(|v| v.downcast::<CFNumber>())
            .and_then(|n| n.to_f64()),
    };

    if snapshot == NowPlayingSnapshot::default() {
        None
    } else {
        Some(snapshot)
    }
}

fn lookup(dict: &CFDictionary<CFString, CFType>, key: &'static str) -> Option<CFType> {
    let key = CFString::from_static_string(key);
    dict.find(&key).map(|value| (*value).clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(pairs: &[(&'static str, CFType)]) -> CFDictionary<CFString, CFType> {
        let pairs: Vec<(CFString, CFType)> = pairs
            .iter()
            .map(|(key, value)| (CFString::from_static_string(*key), value.clone()))
            .collect();
        CFDictionary::from_CFType_pairs(&pairs)
    }

    fn read(dict: &CFDictionary<CFString, CFType>) -> Option<NowPlayingSnapshot> {
        unsafe { snapshot_from_dictionary(dict.as_concrete_TypeRef() as *const c_void) }
    }

    #[test]
    fn full_payload_is_read() {
        let dict = info(&[
            (KEY_TITLE, CFString::new("Song A").as_CFType()),
            (KEY_ARTIST, CFString::new("Band").as_CFType()),
            (KEY_ARTWORK, CFData::from_buffer(&[1, 2, 3]).as_CFType()),
            (KEY_PLAYBACK_RATE, CFNumber::from(1.0f64).as_CFType()),
        ]);

        let snapshot = read(&dict).unwrap();
        assert_eq!(snapshot.title.as_deref(), Some("Song A"));
        assert_eq!(snapshot.artist.as_deref(), Some("Band"));
        assert_eq!(snapshot.artwork, Some(vec![1, 2, 3]));
        assert_eq!(snapshot.playback_rate, Some(1.0));
    }

    #[test]
    fn wrong_types_and_empty_artwork_are_dropped() {
        let dict = info(&[
            (KEY_TITLE, CFNumber::from(42i32).as_CFType()),
            (KEY_ARTIST, CFString::new("Band").as_CFType()),
            (KEY_ARTWORK, CFData::from_buffer(&[]).as_CFType()),
            (KEY_PLAYBACK_RATE, CFNumber::from(0.0f64).as_CFType()),
        ]);

        let snapshot = read(&dict).unwrap();
        assert_eq!(snapshot.title, None);
        assert_eq!(snapshot.artist.as_deref(), Some("Band"));
        assert_eq!(snapshot.artwork, None);
        assert_eq!(snapshot.playback_rate, Some(0.0));
    }

    #[test]
    fn missing_payload_reads_as_nothing_playing() {
        assert_eq!(unsafe { snapshot_from_dictionary(std::ptr::null()) }, None);

        let empty = info(&[]);
        assert_eq!(read(&empty), None);

        let unrelated = info(&[
            ("kMRMediaRemoteNowPlayingInfoAlbum", CFString::new("Album").as_CFType()),
            (KEY_ARTWORK, CFData::from_buffer(&[]).as_CFType()),
        ]);
        assert_eq!(read(&unrelated), None);
    }
}
