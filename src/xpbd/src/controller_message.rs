#[derive(Clone, Debug, PartialEq)]
pub enum ControllerMessage {
	TogglePause,
	FrameForward,
	// free the particle and drive it to a position
	DragParticle(usize, [f32; 2]),
	ReleaseParticle(usize),
	Quit,
}
