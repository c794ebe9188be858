//! Built-in CD audio player module
//!
//! A `GameType::Player` module that accepts any disc set and plays its
//! audio tracks. It keeps the CD loading path always resolvable (its
//! magic test accepts everything) and exercises the Player-type gating
//! in the session: no cheats, no rewind.

use ac_core::{LoadError, Result, StateError};
use ac_media::{DiscInterface, Toc, SECTOR_SIZE};
use ac_module::{
    EmulateSpec, FileExtension, FrameHost, GameType, Module, ModuleCaps, ModuleInfo,
    SimpleCommand, StateMem,
};
use std::sync::Arc;

/// CD audio: 75 sectors per second, 588 stereo frames per sector
const FRAMES_PER_SECTOR: usize = SECTOR_SIZE / 4;

const MASTER_CLOCK: u64 = 44_100 * 768;

static EXTENSIONS: [FileExtension; 0] = [];

/// Descriptor for the player module. Lowest priority: every console
/// module gets to claim a disc first.
pub fn info() -> ModuleInfo {
    ModuleInfo {
        shortname: "cdplay",
        fullname: "CD-DA Player",
        extensions: &EXTENSIONS,
        priority: -10,
        caps: ModuleCaps::CD_LOAD,
        game_type: GameType::Player,
        nominal_width: 192,
        nominal_height: 144,
        lcm_width: 192,
        lcm_height: 144,
        sound_channels: 2,
        master_clock: MASTER_CLOCK,
    }
}

#[derive(Default)]
pub struct CdPlay {
    discs: Vec<Arc<dyn DiscInterface>>,
    tocs: Vec<Toc>,
    cur_disc: u32,
    cur_lba: i32,
    playing: bool,
}

impl CdPlay {
    pub fn new() -> Self {
        Self::default()
    }

    fn toc(&self) -> &Toc {
        &self.tocs[self.cur_disc as usize]
    }

    /// Seek to the start of the first audio track on the current disc.
    fn seek_first_audio(&mut self) {
        let toc = self.toc();
        for t in toc.first_track..=toc.last_track {
            if !toc.tracks[t as usize].data {
                self.cur_lba = toc.tracks[t as usize].lba;
                return;
            }
        }
        self.cur_lba = toc.leadout().lba;
    }

    fn render_sector(&mut self, spec: &mut EmulateSpec) -> usize {
        let toc = self.toc().clone();
        if self.cur_lba >= toc.leadout().lba {
            // Wrap back to the first audio track at the lead-out
            self.seek_first_audio();
        }

        let want = FRAMES_PER_SECTOR.min(spec.sound_max_frames.saturating_sub(spec.sound_frames));
        if want == 0 {
            return 0;
        }

        let mut sector = [0u8; SECTOR_SIZE];
        let on_data = toc
            .track_at(self.cur_lba)
            .map(|t| toc.tracks[t as usize].data)
            .unwrap_or(true);

        if self.playing && !on_data {
            if let Err(e) = self.discs[self.cur_disc as usize].read_sector(self.cur_lba, &mut sector)
            {
                tracing::warn!(lba = self.cur_lba, error = %e, "sector read failed");
                sector.fill(0);
            }
        }
        self.cur_lba += 1;

        let base = spec.sound_frames * 2;
        for i in 0..want * 2 {
            spec.sound_buf[base + i] =
                i16::from_le_bytes([sector[i * 2], sector[i * 2 + 1]]);
        }
        want
    }

    fn draw(&self, spec: &mut EmulateSpec, produced: usize) {
        let fmt = spec.surface.format;
        let inf = info();
        spec.display_rect.w = inf.nominal_width as i32;
        spec.display_rect.h = inf.nominal_height as i32;

        let h = inf.nominal_height;
        let w = inf.nominal_width as usize;
        for y in 0..h {
            spec.surface.line_mut(y)[..w].fill(0);
        }

        // Crude waveform of the newly produced left-channel samples
        if produced > 0 {
            let color = fmt.make_pixel(0x40, 0xFF, 0x40);
            let base = (spec.sound_frames - produced) * 2;
            for x in 0..w {
                let s = spec.sound_buf[base + (x * produced / w) * 2] as i32;
                let y = (h as i32 / 2 + s * (h as i32 / 2) / 32768)
                    .clamp(0, h as i32 - 1) as u32;
                spec.surface.line_mut(y)[x] = color;
            }
        }
    }
}

impl Module for CdPlay {
    fn load_cd(&mut self, discs: &[Arc<dyn DiscInterface>], _layout_hash: &[u8; 20]) -> Result<()> {
        if discs.is_empty() {
            return Err(LoadError::ModuleLoad {
                module: "cdplay".to_string(),
                reason: "empty disc set".to_string(),
            }
            .into());
        }
        self.discs = discs.to_vec();
        self.tocs = discs.iter().map(|d| d.read_toc()).collect();
        self.cur_disc = 0;
        self.playing = true;
        self.seek_first_audio();
        tracing::info!(discs = self.discs.len(), "cdplay loaded disc set");
        Ok(())
    }

    fn test_magic_cd(&self, discs: &[Arc<dyn DiscInterface>]) -> bool {
        !discs.is_empty()
    }

    fn close_game(&mut self) {
        self.discs.clear();
        self.tocs.clear();
    }

    fn game_name(&self) -> Option<String> {
        None
    }

    fn emulate(&mut self, spec: &mut EmulateSpec, _host: &mut dyn FrameHost) {
        let mut produced = 0;
        if spec.sound_enabled() {
            produced = self.render_sector(spec);
            spec.sound_frames += produced;
        } else {
            self.cur_lba += 1;
        }

        if !spec.skip {
            self.draw(spec, produced);
        } else {
            let inf = info();
            spec.display_rect.w = inf.nominal_width as i32;
            spec.display_rect.h = inf.nominal_height as i32;
        }

        spec.master_cycles += MASTER_CLOCK / 75;
    }

    fn set_input(&mut self, _port: usize, _device: &str, _data: &[u8]) {}

    fn do_simple_command(&mut self, cmd: SimpleCommand) {
        match cmd {
            SimpleCommand::Power | SimpleCommand::Reset => {
                self.playing = true;
                self.seek_first_audio();
            }
            SimpleCommand::EjectDisk => self.playing = false,
            SimpleCommand::InsertDisk => self.playing = true,
            SimpleCommand::SelectDisk => {
                if !self.discs.is_empty() {
                    self.cur_disc = (self.cur_disc + 1) % self.discs.len() as u32;
                    self.seek_first_audio();
                }
            }
            SimpleCommand::InsertSpecificDisk(n) => {
                if (n as usize) < self.discs.len() {
                    self.cur_disc = n as u32;
                    self.seek_first_audio();
                }
            }
            _ => {}
        }
    }

    fn state_action(&mut self, sm: &mut StateMem, load: bool) -> std::result::Result<(), StateError> {
        if load {
            let fields = sm.read_section(b"cdpl")?;
            for (name, data) in fields {
                match name.as_str() {
                    "DISC" => {
                        self.cur_disc =
                            u32::from_le_bytes(data.try_into().map_err(|_| {
                                StateError::FieldSize("DISC".into(), 4, data.len())
                            })?)
                    }
                    "LBA" => {
                        self.cur_lba =
                            i32::from_le_bytes(data.try_into().map_err(|_| {
                                StateError::FieldSize("LBA".into(), 4, data.len())
                            })?)
                    }
                    "PLAY" => self.playing = data.first().copied().unwrap_or(0) != 0,
                    _ => {}
                }
            }
        } else {
            sm.write_section(
                b"cdpl",
                &[
                    ("DISC", &self.cur_disc.to_le_bytes()[..]),
                    ("LBA", &self.cur_lba.to_le_bytes()[..]),
                    ("PLAY", &[self.playing as u8][..]),
                ],
            );
        }
        Ok(())
    }
}
