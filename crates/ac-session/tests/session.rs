//! End-to-end session tests with a scripted console module

use std::path::Path;
use std::sync::{Arc, Mutex};

use ac_core::{CoreError, LoadError, Settings, StateError};
use ac_media::{GameFile, NullDiscOpener};
use ac_module::{
    DisplayRect, EmulateSpec, FileExtension, FrameHost, GameType, Module, ModuleCaps, ModuleInfo,
    PixelFormat, Registry, SimpleCommand, StateMem, Surface,
};
use ac_session::{LoopbackNetplay, MemoryMovie, MovieLog, Session};

const TEST_EXTS: &[FileExtension] = &[FileExtension {
    extension: "tst",
    description: "Test ROM",
}];

#[derive(Default)]
struct Shared {
    loaded: Option<String>,
    closed: bool,
    inputs: Vec<(usize, String, Vec<u8>)>,
    commands: Vec<SimpleCommand>,
    frames: u32,
    counter: u32,
    use_mid_sync: bool,
    interlaced: bool,
}

struct TestConsole {
    shared: Arc<Mutex<Shared>>,
}

impl Module for TestConsole {
    fn load(&mut self, name: &str, _file: &mut GameFile) -> ac_core::Result<()> {
        self.shared.lock().unwrap().loaded = Some(name.to_string());
        Ok(())
    }

    fn test_magic(&self, _name: &str, file: &GameFile) -> bool {
        file.data().starts_with(b"TEST")
    }

    fn close_game(&mut self) {
        self.shared.lock().unwrap().closed = true;
    }

    fn emulate(&mut self, spec: &mut EmulateSpec, host: &mut dyn FrameHost) {
        let (counter, use_mid_sync, interlaced, field) = {
            let mut s = self.shared.lock().unwrap();
            s.frames += 1;
            s.counter += 1;
            (s.counter, s.use_mid_sync, s.interlaced, s.frames & 1)
        };

        spec.display_rect = DisplayRect { x: 0, y: 0, w: 8, h: 8 };
        if interlaced {
            spec.interlace_on = true;
            spec.interlace_field = field;
        }
        let write = |spec: &mut EmulateSpec, i: usize| {
            let v = (counter * 10) as i16 + i as i16;
            spec.sound_buf[i * 2] = v;
            spec.sound_buf[i * 2 + 1] = -v;
        };

        if spec.sound_enabled() {
            write(spec, 0);
            write(spec, 1);
            spec.sound_frames = 2;
            spec.master_cycles += 500;
            if use_mid_sync {
                host.mid_sync(spec);
            }
            write(spec, 2);
            write(spec, 3);
            spec.sound_frames = 4;
        }
        spec.master_cycles += 500;
    }

    fn set_input(&mut self, port: usize, device: &str, data: &[u8]) {
        self.shared
            .lock()
            .unwrap()
            .inputs
            .push((port, device.to_string(), data.to_vec()));
    }

    fn do_simple_command(&mut self, cmd: SimpleCommand) {
        self.shared.lock().unwrap().commands.push(cmd);
    }

    fn state_action(&mut self, sm: &mut StateMem, load: bool) -> Result<(), StateError> {
        let mut s = self.shared.lock().unwrap();
        if load {
            let fields = sm.read_section(b"TS00")?;
            for (name, data) in fields {
                if name == "CNTR" {
                    let bytes: [u8; 4] = data
                        .try_into()
                        .map_err(|_| StateError::FieldSize("CNTR".into(), 4, data.len()))?;
                    s.counter = u32::from_le_bytes(bytes);
                }
            }
        } else {
            let bytes = s.counter.to_le_bytes();
            sm.write_section(b"TS00", &[("CNTR", &bytes)]);
        }
        Ok(())
    }
}

fn registry(shared: &Arc<Mutex<Shared>>) -> Arc<Registry> {
    let mut reg = Registry::new();
    let shared = Arc::clone(shared);
    reg.register(
        ModuleInfo {
            shortname: "tst",
            fullname: "Test Console",
            extensions: TEST_EXTS,
            priority: 0,
            caps: ModuleCaps::FILE_LOAD | ModuleCaps::CHEATS,
            game_type: GameType::Cartridge,
            nominal_width: 8,
            nominal_height: 8,
            lcm_width: 8,
            lcm_height: 8,
            sound_channels: 2,
            master_clock: 1_000_000,
        },
        move || {
            Box::new(TestConsole {
                shared: Arc::clone(&shared),
            })
        },
    );
    Arc::new(reg)
}

fn session_with(shared: &Arc<Mutex<Shared>>, base: &Path) -> Session {
    Session::new(
        registry(shared),
        Settings::with_base_dir(base),
        Box::new(NullDiscOpener),
    )
}

fn write_rom(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

fn frame_spec() -> EmulateSpec {
    let mut spec = EmulateSpec::new(Surface::new(64, 64, PixelFormat::xrgb8888()));
    spec.enable_sound(48000.0, 1024, 2);
    spec
}

#[test]
fn test_sniff_load_and_name() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    let rom = write_rom(dir.path(), "My_Game.tst", b"TESTDATA");

    session.load(&rom, None).unwrap();
    assert!(session.is_loaded());
    assert_eq!(session.game_name(), Some("My Game"));
    assert_eq!(shared.lock().unwrap().loaded.as_deref(), Some("My Game"));
}

#[test]
fn test_forced_bypasses_sniffing() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    // Wrong magic and wrong extension still loads when forced
    let rom = write_rom(dir.path(), "blob.bin", b"XXXX");

    session.load(&rom, Some("tst")).unwrap();
    assert!(session.is_loaded());

    let err = session.load(&rom, Some("nope")).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Load(LoadError::UnknownModule(_))
    ));
}

#[test]
fn test_claimed_extension_still_needs_magic() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    // Right extension, wrong magic: the extension claim alone must
    // not win the sniff
    let rom = write_rom(dir.path(), "bad.tst", b"XXXX");

    let err = session.load(&rom, None).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Load(LoadError::UnrecognizedFormat)
    ));
    assert!(!session.is_loaded());
}

#[test]
fn test_disabled_module_is_skipped() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    session.settings.set("tst.enable", "0");
    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");

    let err = session.load(&rom, None).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Load(LoadError::UnrecognizedFormat)
    ));
}

#[test]
fn test_set_input_cached_and_forwarded() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");
    session.load(&rom, None).unwrap();

    session.set_input(0, "gamepad", &[0x12, 0x34]);
    let s = shared.lock().unwrap();
    assert_eq!(s.inputs.len(), 1);
    assert_eq!(s.inputs[0], (0, "gamepad".to_string(), vec![0x12, 0x34]));
}

#[test]
fn test_set_input_ignored_without_game() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());

    // Bindings taken with no game loaded must not survive into a
    // later session's movie log
    session.set_input(2, "gamepad", &[0xFF]);

    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");
    session.load(&rom, None).unwrap();

    let movie = SharedMovie::default();
    movie.0.lock().unwrap().recording = true;
    session.attach_movie(Box::new(movie.clone()));

    let mut spec = frame_spec();
    session.run_frame(&mut spec).unwrap();
    assert!(movie.0.lock().unwrap().inputs.is_empty());
    assert!(shared.lock().unwrap().inputs.is_empty());
}

#[test]
fn test_format_changed_flags_settle() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");
    session.load(&rom, None).unwrap();

    let mut spec = frame_spec();
    session.run_frame(&mut spec).unwrap();
    assert!(spec.video_format_changed);
    assert!(spec.sound_format_changed);

    session.run_frame(&mut spec).unwrap();
    assert!(!spec.video_format_changed);
    assert!(!spec.sound_format_changed);
}

#[test]
fn test_rewind_restores_state_and_reverses_audio() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");
    session.load(&rom, None).unwrap();

    let mut spec = frame_spec();
    for _ in 0..3 {
        session.run_frame(&mut spec).unwrap();
        assert!(!spec.need_sound_reverse);
    }
    assert_eq!(shared.lock().unwrap().counter, 3);

    // The snapshot taken before frame 3 holds counter = 2; a rewind
    // frame restores it and then emulates on top
    spec.need_rewind = true;
    session.run_frame(&mut spec).unwrap();
    assert!(spec.need_sound_reverse);
    assert_eq!(shared.lock().unwrap().counter, 3);
}

#[test]
fn test_netplay_echoes_commands_and_blocks_rewind() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");
    session.load(&rom, None).unwrap();
    session.attach_netplay(Box::new(LoopbackNetplay::default()));

    session.dispatch_simple_command(SimpleCommand::Reset);
    assert!(shared.lock().unwrap().commands.is_empty());

    let mut spec = frame_spec();
    spec.need_rewind = true;
    session.run_frame(&mut spec).unwrap();
    assert_eq!(shared.lock().unwrap().commands, vec![SimpleCommand::Reset]);
    assert!(!spec.need_sound_reverse);
    assert!(!session.take_notices().is_empty());
}

#[test]
fn test_rewind_history_survives_blocked_frames() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");
    session.load(&rom, None).unwrap();

    let mut spec = frame_spec();
    for _ in 0..3 {
        session.run_frame(&mut spec).unwrap();
    }

    // A blocked frame consumes the request without touching history
    session.attach_netplay(Box::new(LoopbackNetplay::default()));
    spec.need_rewind = true;
    session.run_frame(&mut spec).unwrap();
    assert!(!spec.need_rewind);
    assert!(!spec.need_sound_reverse);
    assert_eq!(shared.lock().unwrap().counter, 4);

    // Once the blocker detaches, pre-block snapshots are still there;
    // the newest one holds counter = 2 and emulation runs on top
    session.detach_netplay();
    spec.need_rewind = true;
    session.run_frame(&mut spec).unwrap();
    assert!(spec.need_sound_reverse);
    assert_eq!(shared.lock().unwrap().counter, 3);
}

#[test]
fn test_skipped_interlaced_frame_still_settles_flags() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    shared.lock().unwrap().interlaced = true;
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");
    session.load(&rom, None).unwrap();

    let mut spec = frame_spec();
    spec.skip = true;
    session.run_frame(&mut spec).unwrap();
    assert!(!spec.interlace_on);
    assert_eq!(spec.interlace_field, 0);

    // Field tracking stayed live through the skipped frame
    spec.skip = false;
    session.run_frame(&mut spec).unwrap();
    assert!(!spec.interlace_on);
}

/// Shared handle around [`MemoryMovie`] so the test can inspect what
/// the session appended.
#[derive(Clone, Default)]
struct SharedMovie(Arc<Mutex<MemoryMovie>>);

impl MovieLog for SharedMovie {
    fn is_playing(&self) -> bool {
        self.0.lock().unwrap().playing
    }
    fn is_recording(&self) -> bool {
        self.0.lock().unwrap().recording
    }
    fn append_input(&mut self, port: usize, data: &[u8]) {
        self.0.lock().unwrap().append_input(port, data);
    }
    fn append_command(&mut self, cmd: SimpleCommand) {
        self.0.lock().unwrap().append_command(cmd);
    }
    fn stop(&mut self) {
        self.0.lock().unwrap().stop();
    }
}

#[test]
fn test_movie_playback_suppresses_commands() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");
    session.load(&rom, None).unwrap();

    let movie = SharedMovie::default();
    movie.0.lock().unwrap().playing = true;
    session.attach_movie(Box::new(movie.clone()));

    session.dispatch_simple_command(SimpleCommand::Power);
    assert!(shared.lock().unwrap().commands.is_empty());
    assert!(movie.0.lock().unwrap().commands.is_empty());
}

#[test]
fn test_movie_recording_appends_input_and_commands() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");
    session.load(&rom, None).unwrap();

    let movie = SharedMovie::default();
    movie.0.lock().unwrap().recording = true;
    session.attach_movie(Box::new(movie.clone()));

    session.set_input(1, "gamepad", &[0xAB]);
    session.dispatch_simple_command(SimpleCommand::Reset);

    let mut spec = frame_spec();
    session.run_frame(&mut spec).unwrap();

    let m = movie.0.lock().unwrap();
    assert_eq!(m.commands, vec![SimpleCommand::Reset]);
    assert_eq!(m.inputs, vec![(1, vec![0xAB])]);
    // The command also ran locally
    assert_eq!(shared.lock().unwrap().commands, vec![SimpleCommand::Reset]);
}

#[test]
fn test_save_and_load_state_round_trip() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");
    session.load(&rom, None).unwrap();
    session.set_input(0, "gamepad", &[0x55]);

    let mut spec = frame_spec();
    session.run_frame(&mut spec).unwrap();
    let snap = session.save_state().unwrap();

    session.run_frame(&mut spec).unwrap();
    session.run_frame(&mut spec).unwrap();
    assert_eq!(shared.lock().unwrap().counter, 3);

    session.load_state(snap).unwrap();
    assert_eq!(shared.lock().unwrap().counter, 1);
}

#[test]
fn test_mid_sync_advances_watermarks_without_double_processing() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    shared.lock().unwrap().use_mid_sync = true;
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");
    session.load(&rom, None).unwrap();

    let mut spec = frame_spec();
    spec.sound_volume = 0.5;
    session.run_frame(&mut spec).unwrap();

    // Two frames flushed mid-call, two at the end; each sample is
    // attenuated exactly once
    assert_eq!(spec.sound_frames, 4);
    assert_eq!(spec.sound_frames_alms, 2);
    assert_eq!(spec.master_cycles_alms, 500);
    // The shift-based attenuation floors toward negative infinity,
    // hence -11 -> -6 and -13 -> -7
    assert_eq!(&spec.sound_buf[..8], &[5, -5, 5, -6, 6, -6, 6, -7]);
}

#[test]
fn test_close_is_idempotent() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");
    session.load(&rom, None).unwrap();

    session.close();
    assert!(!session.is_loaded());
    assert!(shared.lock().unwrap().closed);

    // A second close has nothing to do and must not panic
    session.close();

    let mut spec = frame_spec();
    assert!(session.run_frame(&mut spec).is_err());
}

#[test]
fn test_wav_record_attach_and_stop() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");
    session.load(&rom, None).unwrap();

    let wav_path = dir.path().join("out.wav");
    session.start_wav_record(&wav_path, 48000.0).unwrap();

    let mut spec = frame_spec();
    session.run_frame(&mut spec).unwrap();
    session.stop_wav_record().unwrap();

    let written = std::fs::read(&wav_path).unwrap();
    assert_eq!(&written[..4], b"RIFF");
    // 4 sample frames of stereo s16 per emulated frame
    assert_eq!(&written[44..], &{
        let mut expect = Vec::new();
        for i in 0..4i16 {
            expect.extend_from_slice(&(10 + i).to_le_bytes());
            expect.extend_from_slice(&(-(10 + i)).to_le_bytes());
        }
        expect
    }[..]);
}

#[test]
fn test_av_record_writes_frames() {
    let shared = Arc::new(Mutex::new(Shared::default()));
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_with(&shared, dir.path());
    let rom = write_rom(dir.path(), "game.tst", b"TESTDATA");
    session.load(&rom, None).unwrap();

    let av_path = dir.path().join("out.acav");
    session.start_av_record(&av_path, 48000.0).unwrap();

    let mut spec = frame_spec();
    spec.skip = true; // the pipeline must force rendering for the tap
    session.run_frame(&mut spec).unwrap();
    assert!(!spec.skip);
    session.stop_av_record().unwrap();

    let written = std::fs::read(&av_path).unwrap();
    assert_eq!(&written[..4], b"ACAV");
    assert!(written.windows(4).any(|w| w == b"FRAM"));
}
