pub mod shared {
    pub mod bounding_box;
    pub mod capture_config;
    pub mod constants;
    pub mod frame;
    pub mod pose_angle;
    pub mod source_metadata;
}

pub mod detection {
    pub mod domain {
        pub mod face_landmarks;
        pub mod landmark_detector;
        pub mod pose_classifier;
    }
    pub mod infrastructure;
}

pub mod capture {
    pub mod domain {
        pub mod capture_gate;
        pub mod capture_lock;
        pub mod enrollment_form;
        pub mod enrollment_sequencer;
        pub mod stability_debouncer;
    }
}

pub mod dispatch {
    pub mod dispatch_client;
    pub mod domain {
        pub mod dispatch_error;
        pub mod enrollment_service;
        pub mod recognition_service;
    }
    pub mod infrastructure;
}

pub mod session {
    pub mod enrollment_session;
    pub mod frame_loop;
    pub mod rate_limiter;
    pub mod recognition_loop;
    pub mod session_events;
    pub mod session_logger;
}

pub mod video {
    pub mod domain {
        pub mod frame_source;
    }
    pub mod infrastructure;
}
