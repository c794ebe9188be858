//! Frame emulation pipeline
//!
//! Drives the active module for exactly one frame and applies every
//! post stage in a fixed order: netplay/movie input exchange, rewind,
//! emulation, deinterlacing, audio post, recorder taps and temporal
//! blur. The caller owns the `EmulateSpec` and reads the results out
//! of it afterwards.

use ac_core::{CoreError, Result, StateError};
use ac_module::{DisplayRect, EmulateSpec, FrameHost, GameType, StateMem};
use ac_record::WavRecord;
use tracing::warn;

use crate::audio::{AudioCtx, AudioPost};
use crate::movie::MovieLog;
use crate::ports::PortCache;
use crate::session::{Active, Session};
use crate::state::raw_input_state_action;

/// Mid-frame sync sink handed to the module during `emulate`
struct SessionFrameHost<'a> {
    audio: &'a mut AudioPost,
    wav: &'a mut Option<WavRecord>,
    movie: &'a mut Option<Box<dyn MovieLog>>,
    ports: &'a PortCache,
    av_attached: bool,
    soundchan: usize,
    force_mono: bool,
    ff_discard: bool,
    netplay_attached: bool,
}

impl FrameHost for SessionFrameHost<'_> {
    fn mid_sync(&mut self, spec: &mut EmulateSpec) {
        // Netplay frames are atomic; partial flushes would desync
        if self.netplay_attached {
            return;
        }
        let mut ctx = AudioCtx {
            wav: &mut *self.wav,
            av_attached: self.av_attached,
            soundchan: self.soundchan,
            force_mono: self.force_mono,
            ff_discard: self.ff_discard,
        };
        self.audio.process(spec, &mut ctx);

        if let Some(movie) = self.movie.as_mut() {
            if movie.is_recording() {
                for (port, _dev, data) in self.ports.iter_bound() {
                    movie.append_input(port, data);
                }
            }
        }

        spec.sound_frames_alms = spec.sound_frames;
        spec.master_cycles_alms = spec.master_cycles;
    }
}

impl Session {
    /// Run one frame of emulation through the full pipeline.
    pub fn run_frame(&mut self, spec: &mut EmulateSpec) -> Result<()> {
        if self.active.is_none() {
            return Err(CoreError::State(StateError::MissingSection(
                "no game".into(),
            )));
        }

        let caller_volume = spec.sound_volume;
        let caller_multiplier = spec.sound_multiplier;

        // Commands echoed back from peers apply at frame boundaries
        if self.netplay.is_some() {
            loop {
                let cmd = self.netplay.as_mut().and_then(|n| n.poll_command());
                match cmd {
                    Some(c) => self.apply_simple_command(c),
                    None => break,
                }
            }
        }

        let mut pending: Vec<String> = Vec::new();
        {
            let Session {
                active,
                settings,
                ports,
                wav,
                av,
                movie,
                netplay,
                ..
            } = self;
            // Checked above; repeated so the destructured path is total
            let Some(active) = active.as_mut() else {
                return Err(CoreError::State(StateError::MissingSection(
                    "no game".into(),
                )));
            };

            let movie_playing = movie.as_ref().map(|m| m.is_playing()).unwrap_or(false);
            let soundchan = active.info.sound_channels as usize;
            let force_mono =
                soundchan == 2 && settings.get_bool(&format!("{}.forcemono", active.info.shortname));
            let ff_discard = settings.get_bool("sound.ff_discard");

            // Per-frame derived fields start clean
            spec.display_rect = DisplayRect::default();
            spec.line_widths.clear();
            spec.sound_frames = 0;
            spec.sound_frames_alms = 0;
            spec.need_sound_reverse = false;
            spec.master_cycles_alms = spec.master_cycles;

            spec.video_format_changed = active.last_pixel_format != Some(spec.format());
            spec.sound_format_changed = active.last_sound_rate != Some(spec.sound_rate);
            active.last_pixel_format = Some(spec.format());
            active.last_sound_rate = Some(spec.sound_rate);
            if spec.sound_format_changed && spec.sound_enabled() {
                active.audio.sound_format_changed(spec.sound_rate);
            }

            // Recorders want unscaled sound: pin the caller's volume
            // and speed to unity for the frame and apply them only
            // after the taps have seen the samples
            active.audio.begin_frame();
            if wav.is_some() || av.is_some() {
                active.audio.volume_eff = spec.sound_volume;
                active.audio.multiplier_eff = spec.sound_multiplier;
                spec.sound_volume = 1.0;
                spec.sound_multiplier = 1.0;
            }

            if av.is_some() || active.tblur.is_some() {
                spec.skip = false;
            }

            let rewind_blocked = netplay.is_some()
                || movie_playing
                || active.info.game_type == GameType::Player;

            if let Some(np) = netplay.as_mut() {
                np.update(ports);
                for (port, dev, data) in ports.iter_bound() {
                    active.module.set_input(port, dev, data);
                }
            } else if let Some(m) = movie.as_mut() {
                if m.is_recording() {
                    for (port, _dev, data) in ports.iter_bound() {
                        m.append_input(port, data);
                    }
                }
            }

            if rewind_blocked {
                if spec.need_rewind {
                    pending.push("rewind is not available in this session".into());
                }
                // The request is consumed either way; history is kept
                // so rewinding resumes once the blocker detaches
                spec.need_rewind = false;
            } else {
                let Active { module, rewind, .. } = active;
                let mut state_io = |sm: &mut StateMem, load: bool| {
                    module.state_action(sm, load)?;
                    raw_input_state_action(ports, sm, load)
                };
                spec.need_sound_reverse = rewind.run(spec.need_rewind, &mut state_io);
                if spec.need_sound_reverse {
                    // Rewound input must reach the module again
                    for (port, dev, data) in ports.iter_bound() {
                        module.set_input(port, dev, data);
                    }
                }
            }

            let cycles_before = spec.master_cycles;
            {
                let Active { module, audio, .. } = active;
                let mut host = SessionFrameHost {
                    audio,
                    wav: &mut *wav,
                    movie: &mut *movie,
                    ports: &*ports,
                    av_attached: av.is_some(),
                    soundchan,
                    force_mono,
                    ff_discard,
                    netplay_attached: netplay.is_some(),
                };
                module.emulate(spec, &mut host);
            }

            if !spec.skip && spec.display_rect.h == 0 {
                warn!(
                    module = active.info.shortname,
                    "module drew a zero-height frame"
                );
            }
            if spec.master_cycles == cycles_before {
                warn!(
                    module = active.info.shortname,
                    "module consumed no master cycles"
                );
            } else if spec.master_cycles < cycles_before {
                warn!(
                    module = active.info.shortname,
                    "master cycle counter went backwards"
                );
            }
            active.last_master_cycles = spec.master_cycles;

            // Runs on skipped frames too, so the field tracking never
            // goes stale and the flags never leak back to the caller
            if spec.interlace_on {
                if !active.prev_interlaced {
                    active.deint.clear_state();
                }
                active.deint.process(
                    &mut spec.surface,
                    spec.display_rect,
                    &spec.line_widths,
                    spec.interlace_field,
                );
                active.prev_interlaced = true;
                spec.interlace_on = false;
                spec.interlace_field = 0;
            } else {
                active.prev_interlaced = false;
            }

            {
                let mut ctx = AudioCtx {
                    wav: &mut *wav,
                    av_attached: av.is_some(),
                    soundchan,
                    force_mono,
                    ff_discard,
                };
                active.audio.process(spec, &mut ctx);
            }

            let mut detach_av = false;
            if let Some(av_rec) = av.as_mut() {
                let pristine = &active.audio.pristine;
                let (sound, frames) = if pristine.is_empty() {
                    (
                        &spec.sound_buf[..spec.sound_frames * soundchan],
                        spec.sound_frames,
                    )
                } else {
                    (&pristine[..], pristine.len() / soundchan)
                };
                if let Err(e) = av_rec.write_frame(
                    &spec.surface,
                    spec.display_rect,
                    &spec.line_widths,
                    sound,
                    frames,
                    spec.master_cycles.saturating_sub(cycles_before),
                ) {
                    warn!("AV record write failed, detaching: {e}");
                    pending.push("AV recording stopped after a write error".into());
                    detach_av = true;
                }
            }
            if detach_av {
                *av = None;
            }
            active.audio.pristine.clear();

            if let Some(tblur) = active.tblur.as_mut() {
                if !spec.skip {
                    tblur.run(&mut spec.surface, spec.display_rect);
                }
            }
        }

        spec.sound_volume = caller_volume;
        spec.sound_multiplier = caller_multiplier;

        for msg in pending {
            self.notice(msg);
        }
        Ok(())
    }
}
