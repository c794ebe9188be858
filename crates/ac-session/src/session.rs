//! Session lifecycle
//!
//! Owns the active module instance plus everything attached to the
//! running game: input cache, recorders, movie and netplay hooks,
//! rewind history and the audio post state. At most one game is open
//! at a time; load and close fully unwind on failure so a session can
//! always be retried.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use ac_core::{CoreError, LoadError, Result, Settings, StateError};
use ac_media::{
    is_disc_path, is_playlist, layout_fingerprint, read_playlist, DiscInterface, DiscOpener,
    GameFile,
};
use ac_module::{
    GameType, Module, ModuleCaps, ModuleEntry, ModuleInfo, PixelFormat, Registry, SimpleCommand,
    StateMem,
};
use ac_record::{AvRecord, VideoCodec, VideoSpec, WavRecord};
use tracing::{info, warn};

use crate::audio::AudioPost;
use crate::cheats::CheatTable;
use crate::deinterlace::Deinterlacer;
use crate::movie::MovieLog;
use crate::netplay::Netplay;
use crate::ports::{PortCache, MAX_PORTS};
use crate::rewind::RewindBuffer;
use crate::state::raw_input_state_action;
use crate::tblur::TemporalBlur;

/// Everything tied to the lifetime of one loaded game
pub(crate) struct Active {
    pub module: Box<dyn Module>,
    pub info: ModuleInfo,
    pub name: String,
    pub discs: Vec<Arc<dyn DiscInterface>>,
    pub cheats: CheatTable,
    pub last_pixel_format: Option<PixelFormat>,
    pub last_sound_rate: Option<f64>,
    pub prev_interlaced: bool,
    pub deint: Deinterlacer,
    pub tblur: Option<TemporalBlur>,
    pub audio: AudioPost,
    pub rewind: RewindBuffer,
    pub last_master_cycles: u64,
}

pub struct Session {
    registry: Arc<Registry>,
    pub settings: Settings,
    disc_opener: Box<dyn DiscOpener>,
    pub(crate) active: Option<Active>,
    pub(crate) ports: PortCache,
    pub(crate) wav: Option<WavRecord>,
    pub(crate) av: Option<AvRecord>,
    pub(crate) movie: Option<Box<dyn MovieLog>>,
    pub(crate) netplay: Option<Box<dyn Netplay>>,
    notices: VecDeque<String>,
}

impl Session {
    pub fn new(
        registry: Arc<Registry>,
        mut settings: Settings,
        disc_opener: Box<dyn DiscOpener>,
    ) -> Self {
        settings.define_default("srwframes", "600");
        settings.define_default("cd.image_memcache", "0");
        settings.define_default("sound.ff_discard", "0");
        settings.define_default("avrecord.vcodec", "raw");
        settings.define_default("avrecord.w_double_threshold", "384");
        settings.define_default("avrecord.h_double_threshold", "256");

        for entry in registry.iter() {
            let s = entry.info.shortname;
            settings.define_default(&format!("{s}.enable"), "1");
            settings.define_default(&format!("{s}.forcemono"), "0");
            settings.define_default(&format!("{s}.tblur"), "0");
            settings.define_default(&format!("{s}.tblur.accum"), "0");
            settings.define_default(&format!("{s}.tblur.accum.amount"), "50");
        }

        Self {
            registry,
            settings,
            disc_opener,
            active: None,
            ports: PortCache::new(),
            wav: None,
            av: None,
            movie: None,
            netplay: None,
            notices: VecDeque::new(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_info(&self) -> Option<&ModuleInfo> {
        self.active.as_ref().map(|a| &a.info)
    }

    pub fn game_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.name.as_str())
    }

    /// Load a game file, routing playlists and disc images to the CD
    /// path. `forced` bypasses sniffing entirely.
    pub fn load(&mut self, path: &Path, forced: Option<&str>) -> Result<()> {
        if self.is_loaded() {
            self.close();
        }

        if is_disc_path(path) {
            return self.load_disc(path, forced);
        }

        let mut file = GameFile::open(path)?;
        if file.apply_sibling_patch()? {
            info!("applied sibling patch to {}", path.display());
        }

        let name = game_name_from_path(path);
        let registry = Arc::clone(&self.registry);
        let entry = match forced {
            Some(short) => {
                let entry = registry
                    .find_by_name(short)
                    .ok_or_else(|| LoadError::UnknownModule(short.to_string()))?;
                if !entry.info.caps.contains(ModuleCaps::FILE_LOAD) {
                    return Err(LoadError::CdOnlyModule(short.to_string()).into());
                }
                entry
            }
            None => self.sniff_file(&registry, &name, &file)?,
        };

        self.settings.load_module_overrides(entry.info.shortname)?;

        let mut module = entry.instantiate();
        module
            .load(&name, &mut file)
            .map_err(|e| self.wrap_module_load(entry.info.shortname, e))?;

        self.install(module, entry.info.clone(), name, Vec::new())
    }

    /// Load a disc image or M3U playlist of disc images.
    pub fn load_disc(&mut self, path: &Path, forced: Option<&str>) -> Result<()> {
        if self.is_loaded() {
            self.close();
        }

        let paths = if is_playlist(path) {
            read_playlist(path)?
        } else {
            vec![path.to_path_buf()]
        };
        let memcache = self.settings.get_bool("cd.image_memcache");

        let mut discs: Vec<Arc<dyn DiscInterface>> = Vec::with_capacity(paths.len());
        for p in &paths {
            let disc = self.disc_opener.open(p, false, memcache)?;
            let toc = disc.read_toc();
            info!(
                tracks = (toc.last_track - toc.first_track + 1) as u32,
                leadout = toc.leadout().lba,
                "opened disc {}",
                p.display()
            );
            discs.push(disc);
        }
        let layout_hash = layout_fingerprint(&discs);

        let registry = Arc::clone(&self.registry);
        let entry = match forced {
            Some(short) => {
                let entry = registry
                    .find_by_name(short)
                    .ok_or_else(|| LoadError::UnknownModule(short.to_string()))?;
                if !entry.info.caps.contains(ModuleCaps::CD_LOAD) {
                    return Err(LoadError::NoCdSupport(short.to_string()).into());
                }
                entry
            }
            None => self.sniff_cd(&registry, &discs)?,
        };

        self.settings.load_module_overrides(entry.info.shortname)?;

        let mut module = entry.instantiate();
        module
            .load_cd(&discs, &layout_hash)
            .map_err(|e| self.wrap_module_load(entry.info.shortname, e))?;

        let name = game_name_from_path(path);
        self.install(module, entry.info.clone(), name, discs)
    }

    /// Close the current game. Idempotent; attached recorders, movie
    /// and netplay hooks are torn down and the input cache is cleared
    /// either way.
    pub fn close(&mut self) {
        if let Some(mut netplay) = self.netplay.take() {
            netplay.stop();
        }
        if let Some(mut movie) = self.movie.take() {
            movie.stop();
        }
        if let Some(mut wav) = self.wav.take() {
            if let Err(e) = wav.finish() {
                warn!("closing sound log failed: {e}");
            }
        }
        if let Some(mut av) = self.av.take() {
            if let Err(e) = av.finish() {
                warn!("closing AV record failed: {e}");
            }
        }

        if let Some(mut active) = self.active.take() {
            if active.info.game_type != GameType::Player {
                if let Err(e) = active.cheats.flush() {
                    warn!("writing cheat file failed: {e}");
                }
            }
            active.module.remove_read_patches();
            active.module.close_game();
            info!("closed {}", active.name);
        }

        self.ports.clear();
    }

    /// Bind a device to a port and forward the binding to the module.
    /// The binding persists in the session cache so rewind and netplay
    /// can re-forward it. No-op while no game is loaded.
    pub fn set_input(&mut self, port: usize, device: &str, data: &[u8]) {
        let Some(active) = self.active.as_mut() else {
            return;
        };
        if port >= MAX_PORTS {
            warn!(port, "input port out of range");
            return;
        }
        self.ports.set(port, device, data);
        active.module.set_input(port, device, data);
    }

    pub fn set_layer_enable_mask(&mut self, mask: u64) {
        if let Some(active) = self.active.as_mut() {
            active.module.set_layer_enable_mask(mask);
        }
    }

    /// Route a simple command through netplay and movie hooks. During
    /// netplay the command is sent to peers and applied only once it
    /// echoes back through the frame pipeline; during movie playback
    /// local commands are suppressed.
    pub fn dispatch_simple_command(&mut self, cmd: SimpleCommand) {
        if let Some(netplay) = self.netplay.as_mut() {
            netplay.send_command(cmd);
            return;
        }
        if let Some(movie) = self.movie.as_ref() {
            if movie.is_playing() {
                self.notice("command ignored during movie playback");
                return;
            }
        }
        self.apply_simple_command(cmd);
        if let Some(movie) = self.movie.as_mut() {
            if movie.is_recording() {
                movie.append_command(cmd);
            }
        }
    }

    pub(crate) fn apply_simple_command(&mut self, cmd: SimpleCommand) {
        if let Some(active) = self.active.as_mut() {
            active.module.do_simple_command(cmd);
        }
    }

    pub fn power(&mut self) {
        self.dispatch_simple_command(SimpleCommand::Power);
    }

    pub fn reset(&mut self) {
        self.dispatch_simple_command(SimpleCommand::Reset);
    }

    /// Serialize the full session state: module section(s) plus the
    /// raw input section.
    pub fn save_state(&mut self) -> Result<Vec<u8>> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| CoreError::State(StateError::MissingSection("no game".into())))?;
        let mut sm = StateMem::new();
        active.module.state_action(&mut sm, false)?;
        raw_input_state_action(&mut self.ports, &mut sm, false)?;
        Ok(sm.into_bytes())
    }

    pub fn load_state(&mut self, data: Vec<u8>) -> Result<()> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| CoreError::State(StateError::MissingSection("no game".into())))?;
        let mut sm = StateMem::from_bytes(data);
        active.module.state_action(&mut sm, true)?;
        raw_input_state_action(&mut self.ports, &mut sm, true)?;
        // Input restored into the cache must reach the module too
        for (port, device, data) in self.ports.iter_bound() {
            active.module.set_input(port, device, data);
        }
        Ok(())
    }

    pub fn start_wav_record(&mut self, path: &Path, sound_rate: f64) -> Result<()> {
        let channels = self
            .active
            .as_ref()
            .map(|a| a.info.sound_channels as u16)
            .unwrap_or(2);
        self.wav = Some(WavRecord::new(path, sound_rate, channels).map_err(CoreError::Record)?);
        self.notice(format!("sound log started: {}", path.display()));
        Ok(())
    }

    pub fn stop_wav_record(&mut self) -> Result<()> {
        if let Some(mut wav) = self.wav.take() {
            wav.finish().map_err(CoreError::Record)?;
            self.notice("sound log stopped");
        }
        Ok(())
    }

    pub fn start_av_record(&mut self, path: &Path, sound_rate: f64) -> Result<()> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| CoreError::State(StateError::MissingSection("no game".into())))?;
        let codec = VideoCodec::from_setting(&self.settings.get_str("avrecord.vcodec"));
        let spec = VideoSpec::for_module(
            &active.info,
            sound_rate,
            codec,
            self.settings.get_u64("avrecord.w_double_threshold") as u32,
            self.settings.get_u64("avrecord.h_double_threshold") as u32,
        );
        self.av = Some(AvRecord::new(path, spec).map_err(CoreError::Record)?);
        self.notice(format!("AV record started: {}", path.display()));
        Ok(())
    }

    pub fn stop_av_record(&mut self) -> Result<()> {
        if let Some(mut av) = self.av.take() {
            av.finish().map_err(CoreError::Record)?;
            self.notice("AV record stopped");
        }
        Ok(())
    }

    pub fn attach_movie(&mut self, movie: Box<dyn MovieLog>) {
        self.movie = Some(movie);
    }

    pub fn attach_netplay(&mut self, netplay: Box<dyn Netplay>) {
        self.netplay = Some(netplay);
    }

    pub fn detach_netplay(&mut self) {
        if let Some(mut netplay) = self.netplay.take() {
            netplay.stop();
        }
    }

    /// Queued user-facing notices, oldest first.
    pub fn take_notices(&mut self) -> Vec<String> {
        self.notices.drain(..).collect()
    }

    pub(crate) fn notice(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        info!("{msg}");
        self.notices.push_back(msg);
    }

    fn wrap_module_load(&self, shortname: &str, err: CoreError) -> CoreError {
        match err {
            e @ CoreError::Load(LoadError::ModuleLoad { .. }) => e,
            e => LoadError::ModuleLoad {
                module: shortname.to_string(),
                reason: e.to_string(),
            }
            .into(),
        }
    }

    fn module_enabled(&self, info: &ModuleInfo) -> bool {
        self.settings.get_bool(&format!("{}.enable", info.shortname))
    }

    /// Pick a module for a plain file: extension claimers sniff first,
    /// everything else second, both in priority order. Only a module
    /// whose magic test accepts the file may win.
    fn sniff_file<'a>(
        &self,
        registry: &'a Registry,
        name: &str,
        file: &GameFile,
    ) -> Result<&'a ModuleEntry> {
        let ext = file.ext().map(str::to_owned);
        let (ext_matches, rest): (Vec<&'a ModuleEntry>, Vec<&'a ModuleEntry>) = registry
            .priority_order()
            .into_iter()
            .filter(|e| self.module_enabled(&e.info) && e.info.caps.contains(ModuleCaps::FILE_LOAD))
            .partition(|e| {
                ext.as_deref()
                    .map(|x| e.info.claims_extension(x))
                    .unwrap_or(false)
            });

        for &entry in &ext_matches {
            if entry.instantiate().test_magic(name, file) {
                return Ok(entry);
            }
        }
        for &entry in &rest {
            if entry.instantiate().test_magic(name, file) {
                return Ok(entry);
            }
        }
        Err(LoadError::UnrecognizedFormat.into())
    }

    fn sniff_cd<'a>(
        &self,
        registry: &'a Registry,
        discs: &[Arc<dyn DiscInterface>],
    ) -> Result<&'a ModuleEntry> {
        for entry in registry.priority_order() {
            if !self.module_enabled(&entry.info) || !entry.info.caps.contains(ModuleCaps::CD_LOAD) {
                continue;
            }
            if entry.instantiate().test_magic_cd(discs) {
                return Ok(entry);
            }
        }
        Err(LoadError::NoCdHandler.into())
    }

    fn install(
        &mut self,
        mut module: Box<dyn Module>,
        info: ModuleInfo,
        name: String,
        discs: Vec<Arc<dyn DiscInterface>>,
    ) -> Result<()> {
        let name = module.game_name().unwrap_or(name);
        let short = info.shortname;

        module.set_layer_enable_mask(u64::MAX);

        let cheats = if info.game_type != GameType::Player && info.caps.contains(ModuleCaps::CHEATS)
        {
            let table = CheatTable::load(self.settings.base_dir(), &name)?;
            table.install(module.as_mut());
            table
        } else {
            CheatTable::default()
        };

        let tblur = if self.settings.get_bool(&format!("{short}.tblur")) {
            let amount = if self.settings.get_bool(&format!("{short}.tblur.accum")) {
                Some(
                    (self.settings.get_u64(&format!("{short}.tblur.accum.amount")) * 256 / 100)
                        as u32,
                )
            } else {
                None
            };
            Some(TemporalBlur::new(info.lcm_width, info.lcm_height, amount))
        } else {
            None
        };

        let rewind = RewindBuffer::new(self.settings.get_u64("srwframes") as usize);

        info!(module = short, "loaded {name}");
        self.notice(format!("loaded {name} ({})", info.fullname));

        self.active = Some(Active {
            module,
            info,
            name,
            discs,
            cheats,
            last_pixel_format: None,
            last_sound_rate: None,
            prev_interlaced: false,
            deint: Deinterlacer::new(),
            tblur,
            audio: AudioPost::new(),
            rewind,
            last_master_cycles: 0,
        });
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

/// Derive a display name from a file path: basename without extension,
/// underscores as spaces, control characters stripped, trimmed.
pub fn game_name_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    stem.chars()
        .map(|c| if c == '_' { ' ' } else { c })
        .filter(|&c| c >= ' ')
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_game_name_from_path() {
        assert_eq!(
            game_name_from_path(Path::new("/tmp/Super_Game_II.bin")),
            "Super Game II"
        );
        assert_eq!(game_name_from_path(Path::new("a\tb.rom")), "ab");
        assert_eq!(game_name_from_path(Path::new("__pad__.pce")), "pad");
    }
}
